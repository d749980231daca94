//! Error taxonomy shared by every component of the pipeline

use thiserror::Error;

/// Result alias used across crates
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
///
/// Each variant maps to one recovery rule in the session orchestrator:
/// establishment failures terminate the session, everything else degrades.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An adapter could not start its provider session
    #[error("{component} connection failed after {attempts} attempt(s): {message}")]
    ConnectionEstablishment {
        component: String,
        attempts: u32,
        message: String,
    },

    /// Send or receive failed mid-stream
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Language model or synthesis call failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Malformed client message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Bounded queue stayed full past its timeout
    #[error("Backpressure: {0}")]
    Backpressure(String),

    /// Registry or pool is at capacity
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn connection(component: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self::ConnectionEstablishment {
            component: component.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Whether the session must terminate after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionEstablishment { .. } | Self::Capacity(_))
    }

    /// Whether an establishment attempt that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientIo(_) | Self::ConnectionEstablishment { .. } | Self::ChannelClosed
        )
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablishment { .. } => "connection_establishment",
            Self::TransientIo(_) => "transient_io",
            Self::Generation(_) => "generation",
            Self::Protocol(_) => "protocol",
            Self::Backpressure(_) => "backpressure",
            Self::Capacity(_) => "capacity",
            Self::ChannelClosed => "channel_closed",
            Self::Config(_) => "config",
        }
    }
}
