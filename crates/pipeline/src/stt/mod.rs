//! Speech-to-Text
//!
//! - `StreamingRecognizer`: session-scoped adapter over a `RecognitionProvider`
//! - `FinalityPolicy`: the single authoritative finality source per adapter
//! - `DeepgramRecognizer`: REST provider with interim re-transcription

mod deepgram;
mod finality;
mod streaming;

pub use deepgram::{DeepgramRecognizer, DeepgramSttConfig};
pub use finality::{ends_with_terminal_punctuation, FinalityPolicy, StabilityTracker};
pub use streaming::StreamingRecognizer;
