//! Session Orchestrator
//!
//! Drives one session through `Created -> Listening -> Finalizing ->
//! Responding -> Listening`, until the client disconnects, the registry asks
//! the session to stop, or a component fails to start.
//!
//! The orchestrator owns the session's recognizer and, while responding, its
//! synthesizer. Everything it has to say goes out as [`SessionEvent`]s on a
//! bounded channel; the transport decides how to encode them.

use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use retail_voice_config::PipelineConfig;
use retail_voice_core::{
    AudioChunk, Error, ProductCatalog, ProductContext, QueryContext, RecognitionProvider,
    ResponseGenerator, Result, SessionState, SynthesisProvider, TextChunk, VoiceInfo,
};

use crate::stt::StreamingRecognizer;
use crate::tts::{available_voices, StreamingSynthesizer};

/// Decoded client message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    StartSession {
        store_id: Option<String>,
        product_context: Option<ProductContext>,
        voice_id: Option<String>,
    },
    Audio {
        data: Vec<u8>,
        store_id: Option<String>,
        product_context: Option<ProductContext>,
    },
    /// Client stopped talking; finalize and answer
    EndAudio {
        store_id: Option<String>,
        product_context: Option<ProductContext>,
    },
    GetVoices,
    SetVoice { voice_id: String },
}

/// Event produced for the client
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted { session_id: String },
    PartialTranscript { text: String },
    QuickResponse { text: String },
    FinalTranscript { text: String },
    ResponseChunk { text: String },
    Audio(AudioChunk),
    ResponseComplete { full_text: String },
    Voices(Vec<VoiceInfo>),
    Error { message: String },
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Client went away; nothing was sent
    Disconnected,
    /// Stopped through the session registry
    Shutdown,
    /// A component failed fatally; one error event was sent
    Failed(Error),
}

/// Capability handles injected into every session
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub recognition: Arc<dyn RecognitionProvider>,
    pub synthesis: Arc<dyn SynthesisProvider>,
    pub responder: Arc<dyn ResponseGenerator>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub config: PipelineConfig,
}

/// Result of handling one step of the session loop
enum Step {
    Continue,
    Respond(String),
    Stop(SessionOutcome),
}

/// Per-session pipeline driver
pub struct SessionOrchestrator {
    session_id: String,
    deps: OrchestratorDeps,
    events: mpsc::Sender<SessionEvent>,
    state: SessionState,
    recognizer: Option<StreamingRecognizer>,
    synthesizer: Option<StreamingSynthesizer>,
    context: QueryContext,
    voice_id: Option<String>,
    /// Revision of the last transcript event forwarded to the client
    last_revision: u64,
    quick_replied: bool,
    error_sent: bool,
    cleaned_up: bool,
    started_at: Instant,
}

impl SessionOrchestrator {
    pub fn new(
        session_id: impl Into<String>,
        deps: OrchestratorDeps,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            deps,
            events,
            state: SessionState::Created,
            recognizer: None,
            synthesizer: None,
            context: QueryContext::default(),
            voice_id: None,
            last_revision: 0,
            quick_replied: false,
            error_sent: false,
            cleaned_up: false,
            started_at: Instant::now(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until the inbox closes, `shutdown` fires, or a fatal error occurs
    ///
    /// Always releases the session's components before returning.
    pub async fn run(
        &mut self,
        mut inbox: mpsc::Receiver<ClientCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionOutcome {
        let mut ticker = tokio::time::interval(self.deps.config.recognizer.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deferred: VecDeque<ClientCommand> = VecDeque::new();

        let outcome = loop {
            let step = if let Some(command) = deferred.pop_front() {
                self.handle_command(command).await
            } else {
                let listening = self.state == SessionState::Listening;
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => Step::Stop(SessionOutcome::Shutdown),
                    command = inbox.recv() => match command {
                        Some(command) => self.handle_command(command).await,
                        None => Step::Stop(SessionOutcome::Disconnected),
                    },
                    _ = ticker.tick(), if listening => self.poll_recognizer().await,
                }
            };

            let step = match step {
                Step::Respond(utterance) => {
                    self.respond(utterance, &mut inbox, &mut shutdown, &mut deferred)
                        .await
                }
                other => other,
            };

            match step {
                Step::Continue | Step::Respond(_) => {}
                Step::Stop(outcome) => break outcome,
            }
        };

        match &outcome {
            SessionOutcome::Failed(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Session failed")
            }
            other => tracing::info!(session_id = %self.session_id, outcome = ?other, "Session ended"),
        }
        self.cleanup().await;
        outcome
    }

    /// Release the recognizer and any active synthesizer
    ///
    /// Runs once; later calls return immediately.
    pub async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.set_state(SessionState::Terminated);

        if let Some(mut synthesizer) = self.synthesizer.take() {
            synthesizer.close().await;
        }
        if let Some(mut recognizer) = self.recognizer.take() {
            recognizer.close().await;
        }

        metrics::histogram!("session_duration_seconds")
            .record(self.started_at.elapsed().as_secs_f64());
        tracing::debug!(session_id = %self.session_id, "Session resources released");
    }

    async fn handle_command(&mut self, command: ClientCommand) -> Step {
        if self.state.is_terminated() {
            return Step::Stop(SessionOutcome::Shutdown);
        }

        match command {
            ClientCommand::StartSession {
                store_id,
                product_context,
                voice_id,
            } => {
                self.update_context(store_id, product_context);
                if voice_id.is_some() {
                    self.voice_id = voice_id;
                }
                if self.state != SessionState::Created {
                    tracing::debug!(session_id = %self.session_id, "Session already started");
                    return Step::Continue;
                }
                self.start().await
            }
            ClientCommand::Audio {
                data,
                store_id,
                product_context,
            } => {
                self.update_context(store_id, product_context);
                if self.state == SessionState::Created {
                    if let Step::Stop(outcome) = self.start().await {
                        return Step::Stop(outcome);
                    }
                }
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.submit_audio(data).await;
                }
                self.poll_recognizer().await
            }
            ClientCommand::EndAudio {
                store_id,
                product_context,
            } => {
                self.update_context(store_id, product_context);
                if self.state == SessionState::Created {
                    if let Step::Stop(outcome) = self.start().await {
                        return Step::Stop(outcome);
                    }
                }
                self.end_utterance().await
            }
            ClientCommand::GetVoices => self.emit(SessionEvent::Voices(available_voices())).await,
            ClientCommand::SetVoice { voice_id } => {
                tracing::debug!(session_id = %self.session_id, voice_id = %voice_id, "Voice selected");
                self.voice_id = Some(voice_id);
                Step::Continue
            }
        }
    }

    /// Connect the recognizer and announce the session
    async fn start(&mut self) -> Step {
        let created = StreamingRecognizer::create(
            self.session_id.clone(),
            self.deps.recognition.clone(),
            self.deps.config.recognizer.clone(),
        )
        .await;

        match created {
            Ok(recognizer) => {
                self.recognizer = Some(recognizer);
                self.set_state(SessionState::Listening);
                metrics::counter!("sessions_started_total").increment(1);
                self.emit(SessionEvent::SessionStarted {
                    session_id: self.session_id.clone(),
                })
                .await
            }
            Err(e) => self.fail(e).await,
        }
    }

    fn update_context(&mut self, store_id: Option<String>, product: Option<ProductContext>) {
        if let Some(store_id) = store_id {
            self.context.store_id = Some(store_id);
        }
        if let Some(product) = product {
            self.context.product = Some(self.deps.catalog.resolve(product));
        }
    }

    /// Forward new transcript state; a new final starts a response
    async fn poll_recognizer(&mut self) -> Step {
        if self.state != SessionState::Listening {
            return Step::Continue;
        }
        let Some(recognizer) = self.recognizer.as_mut() else {
            return Step::Continue;
        };

        let event = recognizer.poll();
        if event.revision <= self.last_revision {
            return Step::Continue;
        }
        self.last_revision = event.revision;

        if event.is_final {
            return self.on_final(event.text).await;
        }

        if let Step::Stop(outcome) = self
            .emit(SessionEvent::PartialTranscript {
                text: event.text.clone(),
            })
            .await
        {
            return Step::Stop(outcome);
        }

        if self.deps.config.session.quick_reply_enabled && !self.quick_replied {
            if let Some(reply) = self.deps.responder.quick_reply(&event.text, &self.context) {
                self.quick_replied = true;
                metrics::counter!("quick_replies_total").increment(1);
                return self.emit(SessionEvent::QuickResponse { text: reply }).await;
            }
        }
        Step::Continue
    }

    /// Explicit end of audio from the client
    async fn end_utterance(&mut self) -> Step {
        if self.state != SessionState::Listening {
            return Step::Continue;
        }
        if self.recognizer.is_none() {
            return Step::Continue;
        }

        self.set_state(SessionState::Finalizing);
        let (text, revision) = match self.recognizer.as_mut() {
            Some(recognizer) => (recognizer.finalize().await, recognizer.revision()),
            None => (String::new(), self.last_revision),
        };
        self.set_state(SessionState::Listening);

        if revision <= self.last_revision {
            return Step::Continue;
        }
        self.last_revision = revision;
        self.on_final(text).await
    }

    async fn on_final(&mut self, text: String) -> Step {
        self.set_state(SessionState::Finalizing);
        self.quick_replied = false;

        let text = text.trim().to_string();
        if text.is_empty() {
            tracing::debug!(session_id = %self.session_id, "Empty final transcript, still listening");
            self.set_state(SessionState::Listening);
            return Step::Continue;
        }

        tracing::info!(session_id = %self.session_id, transcript = %text, "Final transcript");
        metrics::counter!("utterances_total").increment(1);
        match self
            .emit(SessionEvent::FinalTranscript { text: text.clone() })
            .await
        {
            Step::Stop(outcome) => Step::Stop(outcome),
            _ => Step::Respond(text),
        }
    }

    /// Run one response turn while still watching the inbox and shutdown
    ///
    /// Commands that arrive mid-turn are deferred and handled afterwards. At
    /// most `inbox_capacity` are held; past that the inbox is left unread so
    /// the bounded channel pushes back on the transport.
    async fn respond(
        &mut self,
        utterance: String,
        inbox: &mut mpsc::Receiver<ClientCommand>,
        shutdown: &mut watch::Receiver<bool>,
        deferred: &mut VecDeque<ClientCommand>,
    ) -> Step {
        self.set_state(SessionState::Responding);
        let started = Instant::now();

        let synthesizer = StreamingSynthesizer::start(
            self.session_id.clone(),
            self.deps.synthesis.clone(),
            self.deps.config.synthesizer.clone(),
            self.voice_id.as_deref(),
        )
        .await;
        let synthesizer = match synthesizer {
            Ok(synthesizer) => self.synthesizer.insert(synthesizer),
            Err(e) => return self.fail(e).await,
        };

        let max_deferred = self.deps.config.session.inbox_capacity.max(1);
        let result = {
            let turn = run_turn(
                synthesizer,
                self.deps.responder.as_ref(),
                &utterance,
                &self.context,
                &self.events,
            );
            tokio::pin!(turn);

            loop {
                tokio::select! {
                    result = &mut turn => break result,
                    _ = shutdown.changed() => return Step::Stop(SessionOutcome::Shutdown),
                    command = inbox.recv(), if deferred.len() < max_deferred => match command {
                        Some(command) => deferred.push_back(command),
                        None => return Step::Stop(SessionOutcome::Disconnected),
                    },
                }
            }
        };

        if let Some(mut synthesizer) = self.synthesizer.take() {
            synthesizer.close().await;
        }

        match result {
            Ok(full_text) => {
                metrics::histogram!("response_turn_seconds").record(started.elapsed().as_secs_f64());
                tracing::info!(
                    session_id = %self.session_id,
                    chars = full_text.len(),
                    turn_ms = started.elapsed().as_millis() as u64,
                    "Response complete"
                );
                if let Step::Stop(outcome) = self
                    .emit(SessionEvent::ResponseComplete { full_text })
                    .await
                {
                    return Step::Stop(outcome);
                }
                self.set_state(SessionState::Listening);
                Step::Continue
            }
            Err(Error::ChannelClosed) => Step::Stop(SessionOutcome::Disconnected),
            Err(e) if e.is_fatal() => self.fail(e).await,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Response turn failed");
                metrics::counter!("pipeline_errors_total", "kind" => e.kind()).increment(1);
                if let Step::Stop(outcome) = self
                    .emit(SessionEvent::Error {
                        message: e.to_string(),
                    })
                    .await
                {
                    return Step::Stop(outcome);
                }
                self.set_state(SessionState::Listening);
                Step::Continue
            }
        }
    }

    /// Send an event; a closed channel means the client is gone
    async fn emit(&self, event: SessionEvent) -> Step {
        match self.events.send(event).await {
            Ok(()) => Step::Continue,
            Err(_) => Step::Stop(SessionOutcome::Disconnected),
        }
    }

    /// Report a fatal error once and stop the session
    async fn fail(&mut self, error: Error) -> Step {
        metrics::counter!("pipeline_errors_total", "kind" => error.kind()).increment(1);
        if !self.error_sent {
            self.error_sent = true;
            let _ = self
                .events
                .send(SessionEvent::Error {
                    message: error.to_string(),
                })
                .await;
        }
        Step::Stop(SessionOutcome::Failed(error))
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                session_id = %self.session_id,
                from = %self.state,
                to = %next,
                "Unexpected state transition"
            );
        }
        tracing::debug!(session_id = %self.session_id, from = %self.state, to = %next, "State change");
        self.state = next;
    }
}

/// Stream response text and synthesized audio concurrently
///
/// Returns the full response text once every audio chunk has been forwarded.
async fn run_turn(
    synthesizer: &mut StreamingSynthesizer,
    responder: &dyn ResponseGenerator,
    utterance: &str,
    context: &QueryContext,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<String> {
    let mut audio = synthesizer.audio_stream().ok_or(Error::ChannelClosed)?;

    let text_side = async {
        let mut stream = responder.stream_response(utterance, context);
        let mut parts: Vec<String> = Vec::new();
        let mut result = Ok(());

        while let Some(chunk) = stream.next().await {
            let text = chunk.text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            if events
                .send(SessionEvent::ResponseChunk { text: text.clone() })
                .await
                .is_err()
            {
                result = Err(Error::ChannelClosed);
                break;
            }
            match synthesizer.enqueue_text(TextChunk::new(chunk.index, text.clone())).await {
                Ok(()) => {}
                Err(Error::Backpressure(_)) => {
                    metrics::counter!("pipeline_errors_total", "kind" => "backpressure").increment(1);
                }
                Err(e) => {
                    tracing::warn!(index = chunk.index, error = %e, "Could not queue text for synthesis");
                }
            }
            parts.push(text);
        }

        synthesizer.complete();
        result.map(|()| parts.join(" "))
    };

    let audio_side = async {
        while let Some(chunk) = audio.next().await {
            if events.send(SessionEvent::Audio(chunk)).await.is_err() {
                return Err(Error::ChannelClosed);
            }
        }
        Ok(())
    };

    let (text, audio) = tokio::join!(text_side, audio_side);
    audio?;
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use retail_voice_core::{ProviderEvent, RecognitionChannel, RecognizerInput, TextChunkStream};
    use std::time::Duration;

    struct FlushFinalProvider;

    #[async_trait]
    impl RecognitionProvider for FlushFinalProvider {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
            Ok(String::new())
        }

        async fn open_stream(&self, _session_id: &str) -> Result<RecognitionChannel> {
            let (channel, mut input, events) = RecognitionChannel::pair(16, true);
            let task = tokio::spawn(async move {
                while let Some(item) = input.recv().await {
                    if item == RecognizerInput::Flush {
                        let _ = events
                            .send(ProviderEvent::Transcript {
                                text: "Is it in stock?".into(),
                                is_final: true,
                            })
                            .await;
                    }
                }
            });
            Ok(channel.with_task(task))
        }

        fn name(&self) -> &str {
            "flush-final"
        }
    }

    struct SilentSynth;

    #[async_trait]
    impl SynthesisProvider for SilentSynth {
        async fn connect(&self, _voice: &str) -> Result<()> {
            Ok(())
        }

        async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    struct OneLiner;

    impl ResponseGenerator for OneLiner {
        fn stream_response(&self, _utterance: &str, _context: &QueryContext) -> TextChunkStream {
            Box::pin(futures::stream::iter(vec![TextChunk::new(0, "Yes, 25 units.")]))
        }

        fn quick_reply(&self, _partial: &str, _context: &QueryContext) -> Option<String> {
            None
        }
    }

    struct NoCatalog;

    impl ProductCatalog for NoCatalog {
        fn product(&self, _id: &str) -> Option<ProductContext> {
            None
        }

        fn store_name(&self, _store_id: &str) -> Option<String> {
            None
        }
    }

    fn deps() -> OrchestratorDeps {
        let mut config = PipelineConfig::default();
        config.recognizer.poll_interval_ms = 10;
        config.recognizer.finalize_grace_ms = 100;
        OrchestratorDeps {
            recognition: Arc::new(FlushFinalProvider),
            synthesis: Arc::new(SilentSynth),
            responder: Arc::new(OneLiner),
            catalog: Arc::new(NoCatalog),
            config,
        }
    }

    #[tokio::test]
    async fn test_implicit_start_on_end_audio() {
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let (inbox_tx, inbox_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut orchestrator = SessionOrchestrator::new("s1", deps(), event_tx);
        let session = tokio::spawn(async move {
            let outcome = orchestrator.run(inbox_rx, shutdown_rx).await;
            (outcome, orchestrator.state())
        });

        inbox_tx
            .send(ClientCommand::EndAudio {
                store_id: Some("store_001".into()),
                product_context: None,
            })
            .await
            .unwrap();

        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), event_rx.recv())
                .await
                .unwrap()
                .unwrap();
            let done = matches!(event, SessionEvent::ResponseComplete { .. });
            events.push(event);
            if done {
                break;
            }
        }
        drop(inbox_tx);

        let (outcome, state) = session.await.unwrap();
        assert_eq!(outcome, SessionOutcome::Disconnected);
        assert_eq!(state, SessionState::Terminated);

        assert!(matches!(events[0], SessionEvent::SessionStarted { .. }));
        assert_eq!(
            events[1],
            SessionEvent::FinalTranscript {
                text: "Is it in stock?".into()
            }
        );
        assert_eq!(
            events.last(),
            Some(&SessionEvent::ResponseComplete {
                full_text: "Yes, 25 units.".into()
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_session() {
        let (event_tx, _event_rx) = mpsc::channel(64);
        let (_inbox_tx, inbox_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut orchestrator = SessionOrchestrator::new("s1", deps(), event_tx);
        shutdown_tx.send(true).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(1), orchestrator.run(inbox_rx, shutdown_rx))
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Shutdown);

        orchestrator.cleanup().await;
        assert_eq!(orchestrator.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_get_voices() {
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let (inbox_tx, inbox_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut orchestrator = SessionOrchestrator::new("s1", deps(), event_tx);
        inbox_tx.send(ClientCommand::GetVoices).await.unwrap();
        drop(inbox_tx);
        orchestrator.run(inbox_rx, shutdown_rx).await;

        match event_rx.recv().await {
            Some(SessionEvent::Voices(voices)) => assert_eq!(voices.len(), 11),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
