//! Query processing for the retail voice assistant
//!
//! Features:
//! - OpenAI-compatible chat backend (streaming and non-streaming, with retries)
//! - Prompt construction from product and store context
//! - Sentence chunking of streamed tokens
//! - Query processor producing response chunks and quick replies

pub mod backend;
pub mod chunker;
pub mod processor;
pub mod prompt;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use chunker::SentenceChunker;
pub use processor::QueryProcessor;
pub use prompt::PromptBuilder;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Whether a request that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for retail_voice_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(message) => retail_voice_core::Error::Config(message),
            LlmError::Network(_) | LlmError::Timeout => {
                retail_voice_core::Error::TransientIo(err.to_string())
            }
            other => retail_voice_core::Error::Generation(other.to_string()),
        }
    }
}
