//! Deepgram REST synthesis provider

use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;

use retail_voice_config::{constants, ProviderConfig};
use retail_voice_core::{Error, Result, SynthesisProvider};

/// Deepgram TTS configuration
#[derive(Debug, Clone)]
pub struct DeepgramTtsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub encoding: String,
    pub sample_rate: u32,
}

impl Default for DeepgramTtsConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for DeepgramTtsConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            endpoint: config.deepgram_endpoint.trim_end_matches('/').to_string(),
            api_key: config.deepgram_api_key.clone(),
            encoding: constants::audio::ENCODING.to_string(),
            sample_rate: config.sample_rate,
        }
    }
}

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Deepgram synthesizer
#[derive(Clone)]
pub struct DeepgramSynthesizer {
    client: reqwest::Client,
    config: DeepgramTtsConfig,
}

impl DeepgramSynthesizer {
    pub fn new(config: DeepgramTtsConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("Deepgram API key not configured".to_string()))
    }

    fn speak_query(&self, voice: &str) -> Vec<(&'static str, String)> {
        vec![
            ("model", voice.to_string()),
            ("encoding", self.config.encoding.clone()),
            ("sample_rate", self.config.sample_rate.to_string()),
        ]
    }
}

#[async_trait]
impl SynthesisProvider for DeepgramSynthesizer {
    async fn connect(&self, voice: &str) -> Result<()> {
        // REST synthesis has no session to open; only credentials can be checked
        self.api_key()?;
        tracing::debug!(voice, "Deepgram synthesizer ready");
        Ok(())
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let key = self.api_key()?;
        let url = format!("{}/v1/speak", self.config.endpoint);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&self.speak_query(voice))
            .header("Authorization", format!("Token {}", key))
            .json(&SpeakRequest { text })
            .send()
            .await
            .map_err(|e| Error::TransientIo(format!("Deepgram speak request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Deepgram speak returned {}: {}",
                status, body
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::TransientIo(format!("Deepgram speak body failed: {}", e)))?;

        tracing::debug!(
            voice,
            chars = text.len(),
            audio_bytes = audio.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Deepgram synthesis"
        );
        Ok(audio.to_vec())
    }

    fn name(&self) -> &str {
        "deepgram"
    }
}
