//! Capability traits for the voice pipeline
//!
//! Providers are injected as `Arc<dyn Trait>` handles so each session can be
//! wired against real backends or test stubs.
//!
//! ```text
//! Speech:
//!   - RecognitionProvider: audio -> transcript (one-shot and streaming)
//!   - SynthesisProvider: text -> audio (one-shot, session connect)
//!
//! Language:
//!   - TextGenerator: chat completion (full or token-streamed)
//!   - ResponseGenerator: utterance -> sentence chunks, plus quick replies
//!
//! Data:
//!   - ProductCatalog: read-only product lookup
//! ```

mod catalog;
mod llm;
mod speech;

pub use catalog::ProductCatalog;
pub use llm::{ResponseGenerator, TextChunkStream, TextGenerator};
pub use speech::{
    ProviderEvent, RecognitionChannel, RecognitionProvider, RecognizerInput, SynthesisProvider,
};
