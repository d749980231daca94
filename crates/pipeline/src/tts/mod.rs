//! Text-to-Speech
//!
//! - `StreamingSynthesizer`: bounded FIFO text queue drained by one worker
//! - `normalizer`: speech-friendly text cleanup and segment splitting
//! - `voices`: static voice catalog and backend mapping
//! - `DeepgramSynthesizer`: REST provider for `/v1/speak`

mod deepgram;
pub mod normalizer;
mod streaming;
pub mod voices;

pub use deepgram::{DeepgramSynthesizer, DeepgramTtsConfig};
pub use normalizer::{clean_text_for_tts, number_to_words, split_into_segments};
pub use streaming::StreamingSynthesizer;
pub use voices::{available_voices, resolve_voice};
