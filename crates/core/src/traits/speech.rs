//! Speech processing traits

use crate::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Input accepted by a streaming recognition channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerInput {
    /// Raw audio bytes
    Audio(Vec<u8>),
    /// Flush buffered audio and emit whatever is pending
    Flush,
}

/// Event produced by a streaming recognition channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Transcript { text: String, is_final: bool },
    /// Provider detected the end of an utterance
    UtteranceEnd,
    /// Non-fatal provider error
    Error(String),
}

/// One open streaming recognition session
///
/// The provider drives its network I/O on `task` and talks to the adapter
/// only through the two queues. Dropping `input` asks the task to finish.
pub struct RecognitionChannel {
    pub input: mpsc::Sender<RecognizerInput>,
    pub events: mpsc::Receiver<ProviderEvent>,
    pub task: Option<JoinHandle<()>>,
    /// Whether `is_final` flags from this provider can be trusted
    pub native_finality: bool,
}

impl RecognitionChannel {
    /// Create a channel pair: the adapter keeps the returned channel, the
    /// provider keeps the input receiver and event sender
    pub fn pair(
        capacity: usize,
        native_finality: bool,
    ) -> (
        Self,
        mpsc::Receiver<RecognizerInput>,
        mpsc::Sender<ProviderEvent>,
    ) {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        (
            Self {
                input: input_tx,
                events: event_rx,
                task: None,
                native_finality,
            },
            input_rx,
            event_tx,
        )
    }

    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }
}

/// Speech-to-text capability
#[async_trait]
pub trait RecognitionProvider: Send + Sync + 'static {
    /// Transcribe one complete audio buffer
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Open an incremental recognition session
    async fn open_stream(&self, session_id: &str) -> Result<RecognitionChannel>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Text-to-speech capability
#[async_trait]
pub trait SynthesisProvider: Send + Sync + 'static {
    /// Establish a synthesis session for `voice`
    async fn connect(&self, voice: &str) -> Result<()>;

    /// Synthesize one text segment
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
