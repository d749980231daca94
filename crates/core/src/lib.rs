//! Core traits and types for the retail voice assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Capability traits for pluggable providers (recognition, synthesis, text generation)
//! - Transcript, text-chunk and audio-chunk types shared by the pipeline
//! - Product and query context types
//! - Error taxonomy

pub mod error;
pub mod llm_types;
pub mod product;
pub mod session;
pub mod traits;
pub mod transcript;
pub mod voice;

pub use error::{Error, Result};
pub use llm_types::{GenerateRequest, Message, Role};
pub use product::{ProductContext, QueryContext};
pub use session::SessionState;
pub use transcript::{AudioChunk, TextChunk, TranscriptEvent};
pub use voice::VoiceInfo;

pub use traits::{
    ProductCatalog, ProviderEvent, RecognitionChannel, RecognitionProvider, RecognizerInput,
    ResponseGenerator, SynthesisProvider, TextChunkStream, TextGenerator,
};
