//! Streaming recognizer adapter
//!
//! Wraps one `RecognitionProvider` stream for one session. Provider events are
//! queued by the provider task and only ever consumed here, so transcript
//! state has a single owner.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError};
use tokio::time::timeout;

use retail_voice_config::RecognizerConfig;
use retail_voice_core::{
    Error, ProviderEvent, RecognitionChannel, RecognitionProvider, RecognizerInput, Result,
    TranscriptEvent,
};

use super::finality::FinalityPolicy;

/// Session-scoped streaming recognizer
pub struct StreamingRecognizer {
    session_id: String,
    config: RecognizerConfig,
    provider: Arc<dyn RecognitionProvider>,
    channel: Option<RecognitionChannel>,
    policy: FinalityPolicy,
    connected: bool,
    closed: bool,
    /// Latest transcript state handed out by `poll`
    latest: TranscriptEvent,
    revision: u64,
    /// Finals received but not yet handed out
    pending_finals: Vec<String>,
    /// Last final handed out, used to drop its late partials until new audio arrives
    last_final: Option<String>,
    /// Cached result of `finalize` for the current utterance
    finalized: Option<String>,
}

impl StreamingRecognizer {
    /// Create an adapter that is not connected yet
    pub fn new(
        session_id: impl Into<String>,
        provider: Arc<dyn RecognitionProvider>,
        config: RecognizerConfig,
    ) -> Self {
        let policy = FinalityPolicy::resolve(config.finality, false, config.stability_polls);
        Self {
            session_id: session_id.into(),
            config,
            provider,
            channel: None,
            policy,
            connected: false,
            closed: false,
            latest: TranscriptEvent::default(),
            revision: 0,
            pending_finals: Vec::new(),
            last_final: None,
            finalized: None,
        }
    }

    /// Create and connect, retrying with exponential backoff
    pub async fn create(
        session_id: impl Into<String>,
        provider: Arc<dyn RecognitionProvider>,
        config: RecognizerConfig,
    ) -> Result<Self> {
        let mut recognizer = Self::new(session_id, provider, config);
        recognizer.connect().await?;
        Ok(recognizer)
    }

    /// Establish the provider stream
    ///
    /// Retryable failures are retried up to `max_attempts` times. Exhausting the
    /// attempts, or a non-retryable failure, yields `ConnectionEstablishment`.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = match timeout(
                self.config.connect_timeout(),
                self.provider.open_stream(&self.session_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::TransientIo("connect timed out".to_string())),
            };

            match result {
                Ok(channel) => {
                    self.policy = FinalityPolicy::resolve(
                        self.config.finality,
                        channel.native_finality,
                        self.config.stability_polls,
                    );
                    tracing::info!(
                        session_id = %self.session_id,
                        provider = self.provider.name(),
                        attempt,
                        finality = self.policy.name(),
                        connect_ms = started.elapsed().as_millis() as u64,
                        "Recognizer connected"
                    );
                    self.channel = Some(channel);
                    self.connected = true;
                    self.closed = false;
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_for(attempt);
                    tracing::warn!(
                        session_id = %self.session_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Recognizer connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %self.session_id,
                        attempt,
                        error = %e,
                        "Recognizer connection failed"
                    );
                    return Err(Error::connection("recognizer", attempt, e.to_string()));
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Active finality policy name
    pub fn finality(&self) -> &'static str {
        self.policy.name()
    }

    /// Revision of the latest transcript state
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Forward raw audio to the provider
    ///
    /// Never fails: once disconnected, audio is logged and dropped.
    pub async fn submit_audio(&mut self, chunk: Vec<u8>) {
        if !self.connected {
            tracing::warn!(
                session_id = %self.session_id,
                bytes = chunk.len(),
                "Recognizer not connected, dropping audio"
            );
            return;
        }
        if chunk.is_empty() {
            return;
        }

        // New audio opens the next utterance; staleness only applies to the last one
        self.finalized = None;
        if self.last_final.take().is_some() {
            self.policy.reset();
        }

        let Some(channel) = self.channel.as_ref() else {
            self.connected = false;
            return;
        };

        let bytes = chunk.len();
        match channel
            .input
            .send_timeout(RecognizerInput::Audio(chunk), self.config.poll_interval())
            .await
        {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    bytes,
                    "Recognizer input queue full, dropping audio"
                );
            }
            Err(SendTimeoutError::Closed(_)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    "Recognizer stream closed, marking disconnected"
                );
                self.connected = false;
            }
        }
    }

    /// Latest transcript state
    ///
    /// Returns the same event (same revision) until new data arrives.
    pub fn poll(&mut self) -> TranscriptEvent {
        self.drain_events();

        if let FinalityPolicy::Heuristic(tracker) = &mut self.policy {
            if !self.latest.is_final
                && self.pending_finals.is_empty()
                && !self.latest.text.trim().is_empty()
                && tracker.observe(&self.latest.text)
            {
                self.pending_finals.push(self.latest.text.clone());
            }
        }

        if !self.pending_finals.is_empty() {
            let text = self.pending_finals.join(" ");
            self.pending_finals.clear();
            self.deliver_final(text);
        }

        self.latest.clone()
    }

    /// Flush trailing audio and return the best-known final text
    ///
    /// Idempotent until new audio starts another utterance. Safe to call on an
    /// adapter that never connected.
    pub async fn finalize(&mut self) -> String {
        if let Some(text) = &self.finalized {
            return text.clone();
        }

        if self.connected {
            if let Some(channel) = self.channel.as_ref() {
                if channel.input.send(RecognizerInput::Flush).await.is_err() {
                    tracing::warn!(session_id = %self.session_id, "Recognizer closed before flush");
                    self.connected = false;
                }
            }
            if self.connected {
                self.wait_for_residual().await;
            }
        }
        self.drain_events();

        let text = if !self.pending_finals.is_empty() {
            self.pending_finals.join(" ")
        } else if !self.latest.is_final {
            self.latest.text.trim().to_string()
        } else {
            String::new()
        };
        self.pending_finals.clear();
        self.deliver_final(text.clone());

        tracing::debug!(
            session_id = %self.session_id,
            text = %text,
            "Recognizer finalized utterance"
        );
        self.finalized = Some(text.clone());
        text
    }

    /// Release the provider stream; waits up to `close_timeout` for it to finish
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.connected = false;

        let Some(channel) = self.channel.take() else {
            return;
        };
        let RecognitionChannel { input, events, task, .. } = channel;
        drop(input);
        drop(events);

        if let Some(mut task) = task {
            if timeout(self.config.close_timeout(), &mut task).await.is_err() {
                tracing::warn!(
                    session_id = %self.session_id,
                    "Recognizer task did not stop in time, aborting"
                );
                task.abort();
            }
        }
        tracing::debug!(session_id = %self.session_id, "Recognizer closed");
    }

    fn deliver_final(&mut self, text: String) {
        self.revision += 1;
        self.last_final = Some(text.clone());
        self.latest = TranscriptEvent::new(text, true, self.revision);
        self.policy.reset();
    }

    /// Wait for the provider's answer to a flush, bounded by the grace period
    async fn wait_for_residual(&mut self) {
        let deadline = tokio::time::Instant::now() + self.config.finalize_grace();
        loop {
            let Some(channel) = self.channel.as_mut() else {
                return;
            };
            let received = tokio::time::timeout_at(deadline, channel.events.recv()).await;
            match received {
                Ok(Some(event)) => {
                    let done = matches!(
                        event,
                        ProviderEvent::Transcript { is_final: true, .. } | ProviderEvent::UtteranceEnd
                    );
                    self.apply_event(event);
                    if done {
                        return;
                    }
                }
                Ok(None) => {
                    self.connected = false;
                    return;
                }
                Err(_) => return,
            }
        }
    }

    fn drain_events(&mut self) {
        loop {
            let Some(channel) = self.channel.as_mut() else {
                return;
            };
            let received = channel.events.try_recv();
            match received {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        tracing::warn!(
                            session_id = %self.session_id,
                            "Recognizer event stream ended"
                        );
                    }
                    self.connected = false;
                    return;
                }
            }
        }
    }

    fn apply_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::Transcript { text, is_final } => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return;
                }
                let is_final = is_final && self.policy.is_native();

                if is_final {
                    self.pending_finals.push(text);
                    return;
                }

                // Late revisions of an utterance that is already final
                let stale = self
                    .last_final
                    .iter()
                    .chain(self.pending_finals.iter())
                    .any(|done| done.contains(&text));
                if stale {
                    return;
                }
                if self.pending_finals.is_empty() && !self.latest.is_final && self.latest.text == text {
                    return;
                }

                self.revision += 1;
                self.last_final = None;
                self.latest = TranscriptEvent::new(text, false, self.revision);
            }
            ProviderEvent::UtteranceEnd => {
                if self.policy.is_native()
                    && self.pending_finals.is_empty()
                    && !self.latest.is_final
                    && !self.latest.text.is_empty()
                {
                    self.pending_finals.push(self.latest.text.clone());
                }
            }
            ProviderEvent::Error(message) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %message,
                    "Recognizer provider error"
                );
            }
        }
    }
}

impl Drop for StreamingRecognizer {
    fn drop(&mut self) {
        if let Some(task) = self.channel.as_mut().and_then(|c| c.task.take()) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use retail_voice_config::FinalityMode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Provider whose events are pushed by the test
    struct ScriptedProvider {
        native: bool,
        failures_before_success: u32,
        attempts: AtomicU32,
        events: Mutex<Option<mpsc::Sender<ProviderEvent>>>,
    }

    impl ScriptedProvider {
        fn new(native: bool, failures_before_success: u32) -> Self {
            Self {
                native,
                failures_before_success,
                attempts: AtomicU32::new(0),
                events: Mutex::new(None),
            }
        }

        fn sender(&self) -> mpsc::Sender<ProviderEvent> {
            self.events.lock().unwrap().clone().expect("stream opened")
        }
    }

    #[async_trait]
    impl RecognitionProvider for ScriptedProvider {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
            Ok(String::new())
        }

        async fn open_stream(&self, _session_id: &str) -> Result<RecognitionChannel> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures_before_success {
                return Err(Error::TransientIo(format!("refused #{}", attempt)));
            }
            let (channel, mut input_rx, event_tx) = RecognitionChannel::pair(16, self.native);
            *self.events.lock().unwrap() = Some(event_tx);
            let task = tokio::spawn(async move { while input_rx.recv().await.is_some() {} });
            Ok(channel.with_task(task))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_config(finality: FinalityMode) -> RecognizerConfig {
        RecognizerConfig {
            initial_backoff_ms: 1,
            finalize_grace_ms: 50,
            close_timeout_ms: 50,
            poll_interval_ms: 10,
            finality,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retry_then_connect() {
        let provider = Arc::new(ScriptedProvider::new(true, 2));
        let recognizer =
            StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Auto))
                .await
                .unwrap();
        assert!(recognizer.is_connected());
        assert_eq!(provider.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let provider = Arc::new(ScriptedProvider::new(true, 10));
        let err = StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Auto))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ConnectionEstablishment { attempts: 3, .. }));
        assert_eq!(provider.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_native_finality_ignores_punctuation() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer =
            StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Native))
                .await
                .unwrap();
        let tx = provider.sender();

        tx.send(ProviderEvent::Transcript { text: "Where is it?".into(), is_final: false })
            .await
            .unwrap();
        let event = recognizer.poll();
        assert!(!event.is_final);

        tx.send(ProviderEvent::Transcript { text: "Where is it?".into(), is_final: true })
            .await
            .unwrap();
        let event = recognizer.poll();
        assert!(event.is_final);
        assert_eq!(event.text, "Where is it?");

        // Repeated poll returns the same revision
        assert_eq!(recognizer.poll().revision, event.revision);
    }

    #[tokio::test]
    async fn test_heuristic_ignores_provider_flags() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut config = fast_config(FinalityMode::Heuristic);
        config.stability_polls = 3;
        let mut recognizer = StreamingRecognizer::create("s1", provider.clone(), config)
            .await
            .unwrap();
        let tx = provider.sender();

        tx.send(ProviderEvent::Transcript { text: "price of milk".into(), is_final: true })
            .await
            .unwrap();
        assert!(!recognizer.poll().is_final);
        assert!(!recognizer.poll().is_final);
        let event = recognizer.poll();
        assert!(event.is_final);
        assert_eq!(event.text, "price of milk");
    }

    #[tokio::test]
    async fn test_no_partial_after_final() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer =
            StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Native))
                .await
                .unwrap();
        let tx = provider.sender();

        tx.send(ProviderEvent::Transcript { text: "where is the butter".into(), is_final: true })
            .await
            .unwrap();
        let final_event = recognizer.poll();
        assert!(final_event.is_final);

        // Late partial revision of the same utterance
        tx.send(ProviderEvent::Transcript { text: "where is the".into(), is_final: false })
            .await
            .unwrap();
        let event = recognizer.poll();
        assert_eq!(event, final_event);

        // A new utterance is accepted and has a higher revision
        tx.send(ProviderEvent::Transcript { text: "and the milk".into(), is_final: false })
            .await
            .unwrap();
        let event = recognizer.poll();
        assert!(!event.is_final);
        assert!(event.revision > final_event.revision);
    }

    #[tokio::test]
    async fn test_repeated_question_after_final() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer =
            StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Heuristic))
                .await
                .unwrap();
        let tx = provider.sender();

        tx.send(ProviderEvent::Transcript { text: "Where is the butter?".into(), is_final: false })
            .await
            .unwrap();
        let first = recognizer.poll();
        assert!(first.is_final);

        // Same words again, this time following new audio
        recognizer.submit_audio(vec![0u8; 320]).await;
        tx.send(ProviderEvent::Transcript { text: "Where is".into(), is_final: false })
            .await
            .unwrap();
        let partial = recognizer.poll();
        assert!(!partial.is_final);
        assert_eq!(partial.text, "Where is");
        assert!(partial.revision > first.revision);

        tx.send(ProviderEvent::Transcript { text: "Where is the butter?".into(), is_final: false })
            .await
            .unwrap();
        let second = recognizer.poll();
        assert!(second.is_final);
        assert_eq!(second.text, "Where is the butter?");
        assert!(second.revision > partial.revision);
    }

    #[tokio::test]
    async fn test_repeated_question_native_finalize() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer =
            StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Native))
                .await
                .unwrap();
        let tx = provider.sender();

        tx.send(ProviderEvent::Transcript { text: "Is it in stock".into(), is_final: true })
            .await
            .unwrap();
        assert!(recognizer.poll().is_final);

        recognizer.submit_audio(vec![0u8; 320]).await;
        tx.send(ProviderEvent::Transcript { text: "Is it".into(), is_final: false })
            .await
            .unwrap();
        let partial = recognizer.poll();
        assert!(!partial.is_final);
        assert_eq!(partial.text, "Is it");

        assert_eq!(recognizer.finalize().await, "Is it");
    }

    #[tokio::test]
    async fn test_finalize_before_connect() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer = StreamingRecognizer::new("s1", provider, fast_config(FinalityMode::Auto));
        assert_eq!(recognizer.finalize().await, "");
        assert_eq!(recognizer.finalize().await, "");
        recognizer.close().await;
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer =
            StreamingRecognizer::create("s1", provider.clone(), fast_config(FinalityMode::Native))
                .await
                .unwrap();
        let tx = provider.sender();
        tx.send(ProviderEvent::Transcript { text: "do you have bread".into(), is_final: false })
            .await
            .unwrap();

        assert_eq!(recognizer.finalize().await, "do you have bread");
        assert_eq!(recognizer.finalize().await, "do you have bread");
        assert!(recognizer.poll().is_final);
    }

    #[tokio::test]
    async fn test_submit_after_disconnect_does_not_fail() {
        let provider = Arc::new(ScriptedProvider::new(true, 0));
        let mut recognizer =
            StreamingRecognizer::create("s1", provider, fast_config(FinalityMode::Native))
                .await
                .unwrap();
        recognizer.close().await;
        recognizer.close().await;
        recognizer.submit_audio(vec![0u8; 320]).await;
        assert!(!recognizer.is_connected());
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), recognizer.finalize())
                .await
                .unwrap(),
            ""
        );
    }
}
