//! Transcript, response-text and audio units flowing through a session

use serde::{Deserialize, Serialize};

/// Latest recognition state for the current utterance
///
/// `revision` grows every time the text or finality changes, so consumers can
/// tell a repeated poll from new data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub revision: u64,
}

impl TranscriptEvent {
    pub fn new(text: impl Into<String>, is_final: bool, revision: u64) -> Self {
        Self {
            text: text.into(),
            is_final,
            revision,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One sentence-sized piece of generated response text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position within the response, starting at 0
    pub index: usize,
    pub text: String,
}

impl TextChunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Synthesized audio for (part of) one text chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub session_id: String,
    /// Index of the source text chunk
    pub index: usize,
    /// Emission order within the session
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
