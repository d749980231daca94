//! Voice descriptors

use serde::{Deserialize, Serialize};

/// One selectable synthesis voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    pub description: String,
    /// Voice family ("standard" or "deepgram")
    #[serde(rename = "type")]
    pub kind: String,
}

impl VoiceInfo {
    pub fn new(voice_id: &str, name: &str, description: &str, kind: &str) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            kind: kind.to_string(),
        }
    }
}
