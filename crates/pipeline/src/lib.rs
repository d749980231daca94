//! Streaming speech pipeline
//!
//! This crate provides the per-session streaming machinery:
//! - Streaming recognizer adapter with retrying establishment and one finality source
//! - Streaming synthesizer adapter with a bounded FIFO and a single worker
//! - TTS text normalization and the static voice catalog
//! - Deepgram REST providers for recognition and synthesis
//! - Session orchestrator that drives the listen / respond loop

pub mod orchestrator;
pub mod stt;
pub mod tts;

pub use orchestrator::{
    ClientCommand, OrchestratorDeps, SessionEvent, SessionOrchestrator, SessionOutcome,
};
pub use stt::{DeepgramRecognizer, FinalityPolicy, StabilityTracker, StreamingRecognizer};
pub use tts::{
    available_voices, clean_text_for_tts, resolve_voice, split_into_segments,
    DeepgramSynthesizer, StreamingSynthesizer,
};
