//! Stub providers shared by the server tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use retail_voice_config::Settings;
use retail_voice_core::{
    Error, GenerateRequest, ProductCatalog, ProductContext, ProviderEvent, RecognitionChannel,
    RecognitionProvider, RecognizerInput, Result, SynthesisProvider, TextGenerator,
};
use retail_voice_server::AppState;

/// Emits the configured transcript as a native final on flush
pub struct StubRecognition {
    pub transcript: String,
    pub fail: bool,
}

#[async_trait]
impl RecognitionProvider for StubRecognition {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        if self.fail {
            return Err(Error::TransientIo("recognizer unreachable".to_string()));
        }
        Ok(self.transcript.clone())
    }

    async fn open_stream(&self, _session_id: &str) -> Result<RecognitionChannel> {
        let (channel, mut input, events) = RecognitionChannel::pair(32, true);
        let transcript = self.transcript.clone();

        let task = tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                if item != RecognizerInput::Flush {
                    continue;
                }
                let out = [
                    ProviderEvent::Transcript {
                        text: transcript.clone(),
                        is_final: true,
                    },
                    ProviderEvent::UtteranceEnd,
                ];
                for event in out {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(channel.with_task(task))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Returns the text as audio bytes
pub struct EchoSynthesis;

#[async_trait]
impl SynthesisProvider for EchoSynthesis {
    async fn connect(&self, _voice: &str) -> Result<()> {
        Ok(())
    }

    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Answers every request with the same text
pub struct FixedGenerator {
    pub answer: String,
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        Ok(self.answer.clone())
    }

    async fn generate_stream(
        &self,
        _request: &GenerateRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        for word in self.answer.split_inclusive(' ') {
            if tx.send(word.to_string()).await.is_err() {
                break;
            }
        }
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

pub struct SingleProductCatalog;

impl ProductCatalog for SingleProductCatalog {
    fn product(&self, id: &str) -> Option<ProductContext> {
        (id == "prod_001").then(|| ProductContext {
            id: Some("prod_001".to_string()),
            name: Some("Amul Butter".to_string()),
            brand: Some("Amul".to_string()),
            price: Some(55.0),
            stock: Some(25),
            shelf_location: Some("Aisle 4, Left Side, Shelf 2".to_string()),
            ..Default::default()
        })
    }

    fn store_name(&self, store_id: &str) -> Option<String> {
        (store_id == "store_001").then(|| "Walmart MG Road".to_string())
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.pipeline.recognizer.poll_interval_ms = 10;
    settings.pipeline.recognizer.finalize_grace_ms = 200;
    settings.pipeline.recognizer.close_timeout_ms = 100;
    settings.pipeline.synthesizer.close_timeout_ms = 100;
    settings
}

pub fn test_state(settings: Settings, transcript: &str, answer: &str) -> AppState {
    AppState::new(
        settings,
        Arc::new(StubRecognition {
            transcript: transcript.to_string(),
            fail: false,
        }),
        Arc::new(EchoSynthesis),
        Arc::new(FixedGenerator {
            answer: answer.to_string(),
        }),
        Arc::new(SingleProductCatalog),
    )
}
