//! Streaming pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub recognizer: RecognizerConfig,

    #[serde(default)]
    pub synthesizer: SynthesizerConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recognizer.validate()?;
        self.synthesizer.validate()?;
        self.session.validate()
    }
}

/// Which source decides that a transcript is final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FinalityMode {
    /// Native when the provider supports it, heuristic otherwise
    #[default]
    Auto,
    /// Provider `is_final` flags only
    Native,
    /// Terminal punctuation or stability across polls
    Heuristic,
}

/// Streaming recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Establishment attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor applied to the delay after each failed attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Per-attempt connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub finality: FinalityMode,

    /// Consecutive stable polls before the heuristic declares a transcript final
    #[serde(default = "default_stability_polls")]
    pub stability_polls: usize,

    /// How long `finalize` waits for residual transcripts
    #[serde(default = "default_finalize_grace_ms")]
    pub finalize_grace_ms: u64,

    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    /// Idle poll interval while listening
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the provider input and event queues
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_stability_polls() -> usize {
    3
}

fn default_finalize_grace_ms() -> u64 {
    500
}

fn default_close_timeout_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            connect_timeout_ms: default_connect_timeout_ms(),
            finality: FinalityMode::default(),
            stability_polls: default_stability_polls(),
            finalize_grace_ms: default_finalize_grace_ms(),
            close_timeout_ms: default_close_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RecognizerConfig {
    /// Delay before attempt `attempt + 1` (attempt is 1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.initial_backoff_ms as f64 * factor) as u64)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn finalize_grace(&self) -> Duration {
        Duration::from_millis(self.finalize_grace_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "pipeline.recognizer.max_attempts",
                "At least one attempt is required",
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "pipeline.recognizer.backoff_multiplier",
                format!("Must be >= 1.0, got {}", self.backoff_multiplier),
            ));
        }
        if self.stability_polls == 0 {
            return Err(ConfigError::invalid(
                "pipeline.recognizer.stability_polls",
                "Must be at least 1",
            ));
        }
        if self.poll_interval_ms == 0 || self.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.recognizer",
                "poll_interval_ms and channel_capacity must be positive",
            ));
        }
        Ok(())
    }
}

/// Streaming synthesizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    /// Bounded text queue between the orchestrator and the worker
    #[serde(default = "default_text_queue_capacity")]
    pub text_queue_capacity: usize,

    /// Bounded audio queue between the worker and the consumer
    #[serde(default = "default_audio_queue_capacity")]
    pub audio_queue_capacity: usize,

    /// How long `enqueue_text` blocks on a full queue before giving up
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,

    /// Longest segment sent to the provider in one call
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_text_queue_capacity() -> usize {
    16
}

fn default_audio_queue_capacity() -> usize {
    32
}

fn default_enqueue_timeout_ms() -> u64 {
    2000
}

fn default_max_segment_chars() -> usize {
    200
}

fn default_voice() -> String {
    "alloy".to_string()
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            text_queue_capacity: default_text_queue_capacity(),
            audio_queue_capacity: default_audio_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            max_segment_chars: default_max_segment_chars(),
            connect_timeout_ms: default_connect_timeout_ms(),
            close_timeout_ms: default_close_timeout_ms(),
            default_voice: default_voice(),
        }
    }
}

impl SynthesizerConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.text_queue_capacity == 0 || self.audio_queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.synthesizer",
                "Queue capacities must be positive",
            ));
        }
        if self.max_segment_chars < 20 {
            return Err(ConfigError::invalid(
                "pipeline.synthesizer.max_segment_chars",
                format!("Too small (minimum 20), got {}", self.max_segment_chars),
            ));
        }
        Ok(())
    }
}

/// Per-session orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Forward quick replies for long-enough partial transcripts
    #[serde(default = "default_true")]
    pub quick_reply_enabled: bool,

    /// Capacity of the outbound event queue
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Capacity of the inbound message queue
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Grace period for flushing outbound events on shutdown
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    128
}

fn default_inbox_capacity() -> usize {
    64
}

fn default_shutdown_grace_ms() -> u64 {
    1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quick_reply_enabled: true,
            event_capacity: default_event_capacity(),
            inbox_capacity: default_inbox_capacity(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl SessionConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 || self.inbox_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.session",
                "Queue capacities must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_growth() {
        let config = RecognizerConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_for(2), Duration::from_millis(1500));
        assert_eq!(config.backoff_for(3), Duration::from_millis(2250));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = PipelineConfig::default();
        config.recognizer.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_finality_mode_parsing() {
        let mode: FinalityMode = serde_yaml::from_str("heuristic").unwrap();
        assert_eq!(mode, FinalityMode::Heuristic);
    }
}
