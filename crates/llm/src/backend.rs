//! OpenAI-compatible chat completion backend

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use retail_voice_config::QueryConfig;
use retail_voice_core::{GenerateRequest, Message, TextGenerator};

use crate::LlmError;

/// Backend configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Retries after the first failed request
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for OpenAIConfig {
    fn from(config: &QueryConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// OpenAI-compatible backend
///
/// Works with OpenAI and any server exposing `/chat/completions`.
pub struct OpenAIBackend {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Configuration("OpenAI API key not configured".to_string()))
    }

    fn chat_request<'a>(&self, request: &'a GenerateRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: self.config.model.clone(),
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            stream,
        }
    }

    /// POST the request, retrying transient failures with doubling backoff
    async fn send_with_retry(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let key = self.api_key()?;
        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    max_retries = self.config.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "LLM request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute(key, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }

    async fn execute(&self, key: &str, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = response.text().await.unwrap_or_default();
        // 5xx and rate limiting are retryable, other 4xx are not
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(LlmError::Network(format!("HTTP {}: {}", status, error)));
        }
        Err(LlmError::Api(format!("HTTP {}: {}", status, error)))
    }
}

#[async_trait]
impl TextGenerator for OpenAIBackend {
    async fn generate(&self, request: &GenerateRequest) -> retail_voice_core::Result<String> {
        let started = Instant::now();
        let body = self.chat_request(request, false);
        let response = self.send_with_retry(&body).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        metrics::histogram!("llm_generation_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(
            model = %self.config.model,
            chars = text.len(),
            total_ms = started.elapsed().as_millis() as u64,
            "LLM generation complete"
        );
        Ok(text)
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        tx: mpsc::Sender<String>,
    ) -> retail_voice_core::Result<String> {
        let started = Instant::now();
        let body = self.chat_request(request, true);
        let response = self.send_with_retry(&body).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_text = String::new();
        let mut first_token_ms: Option<u64> = None;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(LlmError::from)?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.replace_range(..=line_end, "");

                let Some(content) = parse_sse_line(&line) else {
                    continue;
                };
                if first_token_ms.is_none() {
                    first_token_ms = Some(started.elapsed().as_millis() as u64);
                }
                full_text.push_str(&content);
                if tx.send(content).await.is_err() {
                    tracing::debug!("Token receiver dropped, stopping stream");
                    break 'read;
                }
            }
        }

        let total_ms = started.elapsed().as_millis() as u64;
        if let Some(ttft) = first_token_ms {
            metrics::histogram!("llm_first_token_seconds").record(ttft as f64 / 1000.0);
        }
        tracing::debug!(
            model = %self.config.model,
            chars = full_text.len(),
            first_token_ms = first_token_ms.unwrap_or(total_ms),
            total_ms,
            "LLM stream complete"
        );
        Ok(full_text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Extract delta content from one SSE line
fn parse_sse_line(line: &str) -> Option<String> {
    let json = line.strip_prefix("data:")?.trim();
    if json.is_empty() || json == "[DONE]" {
        return None;
    }
    let chunk: StreamChunk = serde_json::from_str(json).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url() {
        let backend = OpenAIBackend::new(OpenAIConfig {
            endpoint: "http://localhost:8000/v1/".to_string(),
            ..OpenAIConfig::default()
        })
        .unwrap();
        assert_eq!(backend.chat_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let backend = OpenAIBackend::new(OpenAIConfig::default()).unwrap();
        let request = GenerateRequest::new("system").with_user_message("Where is the butter?");
        let json = serde_json::to_value(backend.chat_request(&request, true)).unwrap();

        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Where is the butter?");
    }

    #[test]
    fn test_parse_sse_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line).as_deref(), Some("Hello"));
        assert_eq!(parse_sse_line("data: [DONE]"), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{}}]}"#), None);
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let backend = OpenAIBackend::new(OpenAIConfig {
            api_key: None,
            ..OpenAIConfig::default()
        })
        .unwrap();
        let err = backend
            .generate(&GenerateRequest::new("system").with_user_message("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, retail_voice_core::Error::Config(_)));
    }
}
