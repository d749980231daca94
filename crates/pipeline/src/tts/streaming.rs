//! Streaming synthesizer adapter
//!
//! Text chunks go through a bounded FIFO to a single worker task, which
//! synthesizes them in order and pushes audio into a second bounded queue.
//! Both queues are FIFO and there is one worker, so audio order always follows
//! text submission order.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

use retail_voice_config::SynthesizerConfig;
use retail_voice_core::{AudioChunk, Error, Result, SynthesisProvider, TextChunk};

use super::normalizer::{clean_text_for_tts, split_into_segments};
use super::voices::resolve_voice;

/// Session-scoped streaming synthesizer
pub struct StreamingSynthesizer {
    session_id: String,
    voice: String,
    config: SynthesizerConfig,
    text_tx: Option<mpsc::Sender<TextChunk>>,
    audio_rx: Option<mpsc::Receiver<AudioChunk>>,
    worker: Option<JoinHandle<()>>,
    closed: bool,
}

impl StreamingSynthesizer {
    /// Establish the synthesis session and spawn the worker
    pub async fn start(
        session_id: impl Into<String>,
        provider: Arc<dyn SynthesisProvider>,
        config: SynthesizerConfig,
        voice_id: Option<&str>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let voice = resolve_voice(voice_id.unwrap_or(&config.default_voice));

        let started = Instant::now();
        let connected = match timeout(config.connect_timeout(), provider.connect(&voice)).await {
            Ok(result) => result,
            Err(_) => Err(Error::TransientIo("connect timed out".to_string())),
        };
        if let Err(e) = connected {
            tracing::error!(
                session_id = %session_id,
                provider = provider.name(),
                voice = %voice,
                error = %e,
                "Synthesizer connection failed"
            );
            return Err(match e {
                e @ Error::ConnectionEstablishment { .. } => e,
                e => Error::connection("synthesizer", 1, e.to_string()),
            });
        }

        let (text_tx, text_rx) = mpsc::channel(config.text_queue_capacity);
        let (audio_tx, audio_rx) = mpsc::channel(config.audio_queue_capacity);

        let worker = Worker {
            session_id: session_id.clone(),
            voice: voice.clone(),
            provider: provider.clone(),
            max_segment_chars: config.max_segment_chars,
        };
        let handle = tokio::spawn(worker.run(text_rx, audio_tx));

        tracing::info!(
            session_id = %session_id,
            provider = provider.name(),
            voice = %voice,
            connect_ms = started.elapsed().as_millis() as u64,
            "Synthesizer started"
        );

        Ok(Self {
            session_id,
            voice,
            config,
            text_tx: Some(text_tx),
            audio_rx: Some(audio_rx),
            worker: Some(handle),
            closed: false,
        })
    }

    /// Backend voice in use
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Queue a text chunk for synthesis
    ///
    /// Blocks up to `enqueue_timeout` while the queue is full. On timeout the
    /// chunk is not synthesized and `Error::Backpressure` is returned.
    pub async fn enqueue_text(&self, chunk: TextChunk) -> Result<()> {
        let Some(tx) = self.text_tx.as_ref() else {
            return Err(Error::ChannelClosed);
        };

        let index = chunk.index;
        match tx.send_timeout(chunk, self.config.enqueue_timeout()).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    index,
                    timeout_ms = self.config.enqueue_timeout_ms,
                    "Synthesizer text queue full, skipping audio for chunk"
                );
                Err(Error::Backpressure(format!(
                    "text queue full for {}ms",
                    self.config.enqueue_timeout_ms
                )))
            }
            Err(SendTimeoutError::Closed(_)) => Err(Error::ChannelClosed),
        }
    }

    /// Signal that no more text will arrive
    pub fn complete(&mut self) {
        if self.text_tx.take().is_some() {
            tracing::debug!(session_id = %self.session_id, "Synthesizer input complete");
        }
    }

    /// Take the audio output; `None` once taken
    ///
    /// The stream ends after `complete` once every queued chunk is synthesized.
    pub fn audio_stream(&mut self) -> Option<ReceiverStream<AudioChunk>> {
        self.audio_rx.take().map(ReceiverStream::new)
    }

    /// Stop the worker, waiting up to `close_timeout` before aborting it
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.text_tx = None;
        self.audio_rx = None;

        if let Some(mut worker) = self.worker.take() {
            if timeout(self.config.close_timeout(), &mut worker).await.is_err() {
                tracing::warn!(
                    session_id = %self.session_id,
                    "Synthesizer worker did not stop in time, aborting"
                );
                worker.abort();
            }
        }
        tracing::debug!(session_id = %self.session_id, "Synthesizer closed");
    }
}

impl Drop for StreamingSynthesizer {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

struct Worker {
    session_id: String,
    voice: String,
    provider: Arc<dyn SynthesisProvider>,
    max_segment_chars: usize,
}

impl Worker {
    async fn run(self, mut text_rx: mpsc::Receiver<TextChunk>, audio_tx: mpsc::Sender<AudioChunk>) {
        let mut sequence = 0u64;

        while let Some(chunk) = text_rx.recv().await {
            let cleaned = clean_text_for_tts(&chunk.text);
            if cleaned.is_empty() {
                continue;
            }

            for segment in split_into_segments(&cleaned, self.max_segment_chars) {
                let started = Instant::now();
                let data = match self.provider.synthesize(&segment, &self.voice).await {
                    Ok(data) if data.is_empty() => continue,
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(
                            session_id = %self.session_id,
                            index = chunk.index,
                            error = %e,
                            "Synthesis failed, skipping segment"
                        );
                        metrics::counter!("synthesis_errors_total").increment(1);
                        continue;
                    }
                };
                metrics::histogram!("synthesis_latency_seconds")
                    .record(started.elapsed().as_secs_f64());

                let audio = AudioChunk {
                    session_id: self.session_id.clone(),
                    index: chunk.index,
                    sequence,
                    data,
                };
                sequence += 1;
                if audio_tx.send(audio).await.is_err() {
                    tracing::debug!(session_id = %self.session_id, "Audio consumer gone");
                    return;
                }
            }
        }

        tracing::debug!(
            session_id = %self.session_id,
            chunks = sequence,
            "Synthesizer worker drained"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::time::Duration;

    struct EchoProvider;

    #[async_trait]
    impl SynthesisProvider for EchoProvider {
        async fn connect(&self, _voice: &str) -> Result<()> {
            Ok(())
        }

        async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct RefusingProvider;

    #[async_trait]
    impl SynthesisProvider for RefusingProvider {
        async fn connect(&self, _voice: &str) -> Result<()> {
            Err(Error::TransientIo("refused".to_string()))
        }

        async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "refusing"
        }
    }

    fn small_config() -> SynthesizerConfig {
        SynthesizerConfig {
            text_queue_capacity: 2,
            audio_queue_capacity: 2,
            enqueue_timeout_ms: 50,
            close_timeout_ms: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_audio_follows_text_order() {
        let mut synth = StreamingSynthesizer::start("s1", Arc::new(EchoProvider), SynthesizerConfig::default(), None)
            .await
            .unwrap();
        let mut audio = synth.audio_stream().unwrap();
        assert!(synth.audio_stream().is_none());

        let consumer = tokio::spawn(async move {
            let mut out = Vec::new();
            while let Some(chunk) = audio.next().await {
                out.push((chunk.index, String::from_utf8(chunk.data).unwrap()));
            }
            out
        });

        for (i, text) in ["One.", "Two.", "Three."].iter().enumerate() {
            synth.enqueue_text(TextChunk::new(i, *text)).await.unwrap();
        }
        synth.complete();

        let out = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            vec![
                (0, "One.".to_string()),
                (1, "Two.".to_string()),
                (2, "Three.".to_string())
            ]
        );
        synth.close().await;
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_forever() {
        let mut synth = StreamingSynthesizer::start("s1", Arc::new(EchoProvider), small_config(), None)
            .await
            .unwrap();

        // Nobody drains audio: the worker stalls and the text queue fills up
        let mut backpressured = 0;
        for i in 0..10 {
            let result = tokio::time::timeout(
                Duration::from_secs(1),
                synth.enqueue_text(TextChunk::new(i, "Filler sentence.")),
            )
            .await
            .expect("enqueue must not hang");
            if matches!(result, Err(Error::Backpressure(_))) {
                backpressured += 1;
            }
        }
        assert!(backpressured > 0);

        synth.complete();
        tokio::time::timeout(Duration::from_secs(1), synth.close())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_after_complete() {
        let mut synth = StreamingSynthesizer::start("s1", Arc::new(EchoProvider), small_config(), None)
            .await
            .unwrap();
        synth.complete();
        synth.complete();
        let err = synth.enqueue_text(TextChunk::new(0, "late")).await.unwrap_err();
        assert_eq!(err, Error::ChannelClosed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut synth = StreamingSynthesizer::start("s1", Arc::new(EchoProvider), small_config(), Some("echo"))
            .await
            .unwrap();
        assert_eq!(synth.voice(), "aura-2-luna-en");
        synth.close().await;
        synth.close().await;
        assert!(synth.audio_stream().is_none());
    }

    #[tokio::test]
    async fn test_start_failure_is_connection_error() {
        let err = StreamingSynthesizer::start("s1", Arc::new(RefusingProvider), small_config(), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ConnectionEstablishment { .. }));
        assert!(err.is_fatal());
    }
}
