//! Configuration management for the retail voice assistant
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (`RETAIL_VOICE_` prefix, `__` separator)
//!
//! The product catalog is a separate YAML seed file loaded by [`YamlCatalog`].

pub mod catalog;
pub mod constants;
pub mod pipeline;
pub mod settings;

pub use catalog::{StoreEntry, YamlCatalog};
pub use pipeline::{
    FinalityMode, PipelineConfig, RecognizerConfig, SessionConfig, SynthesizerConfig,
};
pub use settings::{
    load_settings, ObservabilityConfig, ProviderConfig, QueryConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for retail_voice_core::Error {
    fn from(err: ConfigError) -> Self {
        retail_voice_core::Error::Config(err.to_string())
    }
}
