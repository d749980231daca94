//! WebSocket envelopes
//!
//! Every frame is a JSON object with a snake_case `type` tag. Audio travels
//! as standard base64.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use retail_voice_core::{Error, ProductContext, VoiceInfo};
use retail_voice_pipeline::{ClientCommand, SessionEvent};

/// Inbound message from the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartSession {
        store_id: Option<String>,
        product_context: Option<ProductContext>,
        voice_id: Option<String>,
    },
    AudioChunk {
        /// Base64 encoded PCM
        audio: String,
        store_id: Option<String>,
        product_context: Option<ProductContext>,
    },
    EndAudio {
        store_id: Option<String>,
        product_context: Option<ProductContext>,
    },
    GetVoices,
    SetVoice {
        voice_id: String,
    },
}

impl ClientMessage {
    /// Decode one text frame
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Protocol(e.to_string()))
    }

    /// Convert into an orchestrator command, decoding any audio payload
    pub fn into_command(self) -> Result<ClientCommand, Error> {
        let command = match self {
            ClientMessage::StartSession {
                store_id,
                product_context,
                voice_id,
            } => ClientCommand::StartSession {
                store_id,
                product_context,
                voice_id,
            },
            ClientMessage::AudioChunk {
                audio,
                store_id,
                product_context,
            } => ClientCommand::Audio {
                data: BASE64
                    .decode(audio.as_bytes())
                    .map_err(|e| Error::Protocol(format!("Invalid audio payload: {}", e)))?,
                store_id,
                product_context,
            },
            ClientMessage::EndAudio {
                store_id,
                product_context,
            } => ClientCommand::EndAudio {
                store_id,
                product_context,
            },
            ClientMessage::GetVoices => ClientCommand::GetVoices,
            ClientMessage::SetVoice { voice_id } => ClientCommand::SetVoice { voice_id },
        };
        Ok(command)
    }
}

/// Outbound message to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    SessionStarted { session_id: String },
    PartialTranscript { text: String, is_final: bool },
    QuickResponse { text: String },
    FinalTranscript { text: String, is_final: bool },
    ResponseChunk { text: String },
    AudioChunk { audio: String, session_id: String },
    ResponseComplete { full_text: String },
    Voices { voices: Vec<VoiceInfo> },
    Error { message: String },
}

impl WsMessage {
    pub fn error(message: impl Into<String>) -> Self {
        WsMessage::Error {
            message: message.into(),
        }
    }

    /// Envelope type tag, for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            WsMessage::SessionStarted { .. } => "session_started",
            WsMessage::PartialTranscript { .. } => "partial_transcript",
            WsMessage::QuickResponse { .. } => "quick_response",
            WsMessage::FinalTranscript { .. } => "final_transcript",
            WsMessage::ResponseChunk { .. } => "response_chunk",
            WsMessage::AudioChunk { .. } => "audio_chunk",
            WsMessage::ResponseComplete { .. } => "response_complete",
            WsMessage::Voices { .. } => "voices",
            WsMessage::Error { .. } => "error",
        }
    }
}

impl From<SessionEvent> for WsMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::SessionStarted { session_id } => WsMessage::SessionStarted { session_id },
            SessionEvent::PartialTranscript { text } => WsMessage::PartialTranscript {
                text,
                is_final: false,
            },
            SessionEvent::QuickResponse { text } => WsMessage::QuickResponse { text },
            SessionEvent::FinalTranscript { text } => WsMessage::FinalTranscript {
                text,
                is_final: true,
            },
            SessionEvent::ResponseChunk { text } => WsMessage::ResponseChunk { text },
            SessionEvent::Audio(chunk) => WsMessage::AudioChunk {
                audio: BASE64.encode(&chunk.data),
                session_id: chunk.session_id,
            },
            SessionEvent::ResponseComplete { full_text } => WsMessage::ResponseComplete { full_text },
            SessionEvent::Voices(voices) => WsMessage::Voices { voices },
            SessionEvent::Error { message } => WsMessage::Error { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retail_voice_core::AudioChunk;

    #[test]
    fn test_parse_end_audio_with_context() {
        let message = ClientMessage::parse(
            r#"{"type": "end_audio", "store_id": "store_001", "product_context": {"product_id": "prod_001"}}"#,
        )
        .unwrap();

        let ClientMessage::EndAudio {
            store_id,
            product_context,
        } = message
        else {
            panic!("expected end_audio");
        };
        assert_eq!(store_id.as_deref(), Some("store_001"));
        assert_eq!(product_context.unwrap().id.as_deref(), Some("prod_001"));
    }

    #[test]
    fn test_audio_payload_is_base64() {
        let command = ClientMessage::parse(r#"{"type": "audio_chunk", "audio": "AAEC"}"#)
            .unwrap()
            .into_command()
            .unwrap();
        assert_eq!(
            command,
            ClientCommand::Audio {
                data: vec![0, 1, 2],
                store_id: None,
                product_context: None,
            }
        );

        let err = ClientMessage::parse(r#"{"type": "audio_chunk", "audio": "not base64!"}"#)
            .unwrap()
            .into_command()
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_malformed_is_protocol_error() {
        assert!(matches!(
            ClientMessage::parse("{not json"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type": "dance"}"#),
            Err(Error::Protocol(_))
        ));
        assert_eq!(
            ClientMessage::parse(r#"{"type": "get_voices"}"#).unwrap(),
            ClientMessage::GetVoices
        );
    }

    #[test]
    fn test_outbound_envelopes() {
        let audio = WsMessage::from(SessionEvent::Audio(AudioChunk {
            session_id: "s1".to_string(),
            index: 0,
            sequence: 0,
            data: vec![0, 1, 2],
        }));
        assert_eq!(
            serde_json::to_value(&audio).unwrap(),
            serde_json::json!({"type": "audio_chunk", "audio": "AAEC", "session_id": "s1"})
        );

        let final_transcript = WsMessage::from(SessionEvent::FinalTranscript {
            text: "Where is the butter?".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&final_transcript).unwrap(),
            serde_json::json!({
                "type": "final_transcript",
                "text": "Where is the butter?",
                "is_final": true
            })
        );

        let complete = WsMessage::from(SessionEvent::ResponseComplete {
            full_text: "It is in aisle four.".to_string(),
        });
        assert_eq!(complete.kind(), "response_complete");
        assert_eq!(
            serde_json::to_value(&complete).unwrap()["full_text"],
            "It is in aisle four."
        );
    }
}
