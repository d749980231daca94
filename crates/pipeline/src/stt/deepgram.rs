//! Deepgram REST recognition provider
//!
//! Streaming is layered on the one-shot `/v1/listen` endpoint: audio is
//! buffered, the accumulated buffer is re-transcribed every `interim_bytes`
//! to produce partials, and a flush produces the final for the utterance.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tokio::sync::mpsc;

use retail_voice_config::ProviderConfig;
use retail_voice_core::{
    Error, ProviderEvent, RecognitionChannel, RecognitionProvider, RecognizerInput, Result,
};

/// Deepgram STT configuration
#[derive(Debug, Clone)]
pub struct DeepgramSttConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
    /// Buffered bytes between interim transcriptions
    pub interim_bytes: usize,
    pub channel_capacity: usize,
}

impl Default for DeepgramSttConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for DeepgramSttConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            endpoint: config.deepgram_endpoint.trim_end_matches('/').to_string(),
            api_key: config.deepgram_api_key.clone(),
            model: config.stt_model.clone(),
            language: config.language.clone(),
            sample_rate: config.sample_rate,
            interim_bytes: config.interim_bytes,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl ListenResponse {
    fn transcript(self) -> String {
        self.results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default()
    }
}

/// Deepgram recognizer
#[derive(Clone)]
pub struct DeepgramRecognizer {
    client: reqwest::Client,
    config: DeepgramSttConfig,
}

impl DeepgramRecognizer {
    pub fn new(config: DeepgramSttConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("Deepgram API key not configured".to_string()))
    }

    /// POST audio to `/v1/listen`; `raw` audio is declared as linear16
    async fn listen(&self, audio: &[u8], raw: bool) -> Result<String> {
        let key = self.api_key()?;
        let url = format!("{}/v1/listen", self.config.endpoint);

        let mut query: Vec<(&str, String)> = vec![
            ("model", self.config.model.clone()),
            ("language", self.config.language.clone()),
            ("punctuate", "true".to_string()),
            ("smart_format", "true".to_string()),
        ];
        let content_type = if raw {
            query.push(("encoding", "linear16".to_string()));
            query.push(("sample_rate", self.config.sample_rate.to_string()));
            "audio/l16"
        } else {
            "audio/wav"
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&query)
            .header("Authorization", format!("Token {}", key))
            .header("Content-Type", content_type)
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| Error::TransientIo(format!("Deepgram listen request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Deepgram listen returned {}: {}",
                status, body
            )));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Invalid Deepgram response: {}", e)))?;
        let text = parsed.transcript();

        tracing::debug!(
            audio_bytes = audio.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "Deepgram transcription"
        );
        Ok(text)
    }

    async fn run_stream(
        self,
        session_id: String,
        mut input: mpsc::Receiver<RecognizerInput>,
        events: mpsc::Sender<ProviderEvent>,
    ) {
        let mut buffer: Vec<u8> = Vec::new();
        let mut transcribed_len = 0usize;

        while let Some(item) = input.recv().await {
            match item {
                RecognizerInput::Audio(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    if buffer.len() - transcribed_len < self.config.interim_bytes {
                        continue;
                    }
                    transcribed_len = buffer.len();
                    let event = match self.listen(&buffer, true).await {
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => ProviderEvent::Transcript {
                            text,
                            is_final: false,
                        },
                        Err(e) => ProviderEvent::Error(e.to_string()),
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                RecognizerInput::Flush => {
                    if !buffer.is_empty() {
                        let event = match self.listen(&buffer, true).await {
                            Ok(text) => ProviderEvent::Transcript {
                                text,
                                is_final: true,
                            },
                            Err(e) => ProviderEvent::Error(e.to_string()),
                        };
                        buffer.clear();
                        transcribed_len = 0;
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    if events.send(ProviderEvent::UtteranceEnd).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(session_id = %session_id, "Deepgram stream task finished");
    }
}

#[async_trait]
impl RecognitionProvider for DeepgramRecognizer {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        self.listen(audio, false).await
    }

    async fn open_stream(&self, session_id: &str) -> Result<RecognitionChannel> {
        self.api_key()?;

        let (channel, input_rx, event_tx) =
            RecognitionChannel::pair(self.config.channel_capacity, true);
        let task = tokio::spawn(self.clone().run_stream(
            session_id.to_string(),
            input_rx,
            event_tx,
        ));
        Ok(channel.with_task(task))
    }

    fn name(&self) -> &str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listen_response() {
        let json = r#"{
            "metadata": {"request_id": "abc"},
            "results": {"channels": [{"alternatives": [{"transcript": " Where is the butter? ", "confidence": 0.98}]}]}
        }"#;
        let parsed: ListenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.transcript(), "Where is the butter?");
    }

    #[test]
    fn test_parse_empty_response() {
        let parsed: ListenResponse = serde_json::from_str(r#"{"results": {"channels": []}}"#).unwrap();
        assert_eq!(parsed.transcript(), "");
    }

    #[tokio::test]
    async fn test_open_stream_requires_key() {
        let config = DeepgramSttConfig {
            api_key: None,
            ..DeepgramSttConfig::default()
        };
        let recognizer = DeepgramRecognizer::new(config, reqwest::Client::new());
        let err = recognizer.open_stream("s1").await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_retryable());
    }
}
