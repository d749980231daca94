//! HTTP Endpoints
//!
//! REST API for the retail voice assistant.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use retail_voice_core::{ProductContext, QueryContext};
use retail_voice_pipeline::{available_voices, clean_text_for_tts, resolve_voice};

use crate::metrics::{metrics_handler, record_error, record_query_latency};
use crate::state::AppState;
use crate::websocket::WebSocketHandler;
use crate::ServerError;

const SERVICE_NAME: &str = "retail-voice-backend";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = build_cors_layer(&config.server.cors_origins);
    let ws_path = config.server.ws_path.clone();
    let timeout = Duration::from_secs(config.server.timeout_seconds);
    drop(config);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/voice-agent/voices", get(list_voices))
        .route("/voice-agent/query", post(voice_query))
        // Streaming sessions; the upgrade itself returns immediately
        .route(&ws_path, get(WebSocketHandler::handle))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Permissive when no origins are configured, otherwise the listed origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, allowing any origin");
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "active_sessions": state.sessions.count(),
    }))
}

async fn list_voices() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "voices": available_voices() }))
}

/// One-shot voice query
#[derive(Debug, Deserialize)]
pub struct VoiceQueryRequest {
    /// Base64 encoded audio
    pub audio: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceQueryResponse {
    pub transcript: String,
    pub text: String,
    /// Base64 encoded audio
    pub audio: String,
}

/// Transcribe, answer and synthesize in one request
async fn voice_query(
    State(state): State<AppState>,
    Json(request): Json<VoiceQueryRequest>,
) -> Result<Json<VoiceQueryResponse>, ServerError> {
    let started = Instant::now();

    let audio = BASE64
        .decode(request.audio.as_bytes())
        .map_err(|e| ServerError::InvalidRequest(format!("Invalid audio payload: {}", e)))?;
    if audio.is_empty() {
        return Err(ServerError::InvalidRequest("Empty audio payload".to_string()));
    }

    let transcript = state.recognition.transcribe(&audio).await.map_err(|e| {
        record_error(e.kind());
        ServerError::Provider(format!("Transcription failed: {}", e))
    })?;
    let transcript = transcript.trim().to_string();
    if transcript.is_empty() {
        return Err(ServerError::InvalidRequest(
            "No speech detected in audio".to_string(),
        ));
    }

    let product = request.product_id.as_deref().map(|id| {
        state.catalog.product(id).unwrap_or_else(|| ProductContext {
            id: Some(id.to_string()),
            ..Default::default()
        })
    });
    let context = QueryContext::new(request.store_id.clone(), product);
    let text = state.processor.answer(&transcript, &context).await;

    let voice = {
        let config = state.get_config();
        resolve_voice(
            request
                .voice_id
                .as_deref()
                .unwrap_or(&config.pipeline.synthesizer.default_voice),
        )
    };
    let speech = state
        .synthesis
        .synthesize(&clean_text_for_tts(&text), &voice)
        .await
        .map_err(|e| {
            record_error(e.kind());
            ServerError::Provider(format!("Synthesis failed: {}", e))
        })?;

    record_query_latency(started.elapsed());
    tracing::info!(
        transcript_chars = transcript.len(),
        response_chars = text.len(),
        audio_bytes = speech.len(),
        total_ms = started.elapsed().as_millis() as u64,
        "Voice query complete"
    );

    Ok(Json(VoiceQueryResponse {
        transcript,
        text,
        audio: BASE64.encode(&speech),
    }))
}
