//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{endpoints, env};
use crate::{ConfigError, PipelineConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Streaming pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Query processor / LLM configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Speech provider configuration
    #[serde(default)]
    pub providers: ProviderConfig,

    /// Path to the product catalog seed file
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_catalog_path() -> String {
    "config/catalog.yaml".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
            query: QueryConfig::default(),
            providers: ProviderConfig::default(),
            catalog_path: default_catalog_path(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.pipeline.validate()?;
        self.validate_query()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }
        if self.server.max_sessions == 0 {
            return Err(ConfigError::invalid(
                "server.max_sessions",
                "At least one session must be allowed",
            ));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "server.ws_path",
                format!("Must start with '/', got {}", self.server.ws_path),
            ));
        }
        Ok(())
    }

    fn validate_query(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.query.temperature) {
            return Err(ConfigError::invalid(
                "query.temperature",
                format!("Must be between 0.0 and 2.0, got {}", self.query.temperature),
            ));
        }
        if self.query.max_tokens == 0 {
            return Err(ConfigError::invalid("query.max_tokens", "Must be positive"));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// WebSocket path for streaming sessions
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Maximum concurrent sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ws_path() -> String {
    "/voice-agent/stream".to_string()
}

fn default_max_sessions() -> usize {
    100
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            max_sessions: default_max_sessions(),
            timeout_seconds: default_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

/// OpenAI-compatible chat backend and quick-reply settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Falls back to `OPENAI_API_KEY`
    #[serde(default = "default_openai_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first failed request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Partial transcripts shorter than this never get a quick reply
    #[serde(default = "default_quick_reply_min_chars")]
    pub quick_reply_min_chars: usize,
}

fn default_llm_endpoint() -> String {
    endpoints::OPENAI_DEFAULT.to_string()
}

fn default_llm_model() -> String {
    "gpt-4".to_string()
}

fn default_openai_key() -> Option<String> {
    std::env::var(env::OPENAI_API_KEY).ok()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_quick_reply_min_chars() -> usize {
    10
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: default_openai_key(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_llm_timeout_ms(),
            max_retries: default_max_retries(),
            quick_reply_min_chars: default_quick_reply_min_chars(),
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Deepgram speech provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_deepgram_endpoint")]
    pub deepgram_endpoint: String,

    /// Falls back to `DEEPGRAM_API_KEY`
    #[serde(default = "default_deepgram_key")]
    pub deepgram_api_key: Option<String>,

    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Buffered bytes between interim transcriptions
    #[serde(default = "default_interim_bytes")]
    pub interim_bytes: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_deepgram_endpoint() -> String {
    endpoints::DEEPGRAM_DEFAULT.to_string()
}

fn default_deepgram_key() -> Option<String> {
    std::env::var(env::DEEPGRAM_API_KEY).ok()
}

fn default_stt_model() -> String {
    "nova-2".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_sample_rate() -> u32 {
    crate::constants::audio::SAMPLE_RATE
}

fn default_interim_bytes() -> usize {
    crate::constants::audio::BYTES_PER_SECOND
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            deepgram_endpoint: default_deepgram_endpoint(),
            deepgram_api_key: default_deepgram_key(),
            stt_model: default_stt_model(),
            language: default_language(),
            sample_rate: default_sample_rate(),
            interim_bytes: default_interim_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at /metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("RETAIL_VOICE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
