//! Retail Voice Server
//!
//! Provides the WebSocket streaming endpoint and the HTTP API.

pub mod http;
pub mod metrics;
pub mod protocol;
pub mod session;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, record_error, record_session_ended, record_session_started};
pub use protocol::{ClientMessage, WsMessage};
pub use session::SessionRegistry;
pub use state::AppState;
pub use websocket::WebSocketHandler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream provider error: {0}")]
    Provider(String),

    #[error("Service at capacity: {0}")]
    Capacity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Session(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServerError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<retail_voice_core::Error> for ServerError {
    fn from(err: retail_voice_core::Error) -> Self {
        use retail_voice_core::Error;
        match err {
            Error::Capacity(message) => ServerError::Capacity(message),
            Error::Protocol(message) => ServerError::InvalidRequest(message),
            Error::Config(message) => ServerError::Internal(message),
            other => ServerError::Provider(other.to_string()),
        }
    }
}
