//! Prometheus metrics

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::state::AppState;

/// Install the global Prometheus recorder
///
/// Returns None if a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

pub fn record_session_started(active: usize) {
    metrics::counter!("ws_connections_total").increment(1);
    metrics::gauge!("ws_connections_active").set(active as f64);
}

pub fn record_session_ended(outcome: &'static str, duration: Duration, active: usize) {
    metrics::counter!("ws_connections_closed_total", "outcome" => outcome).increment(1);
    metrics::histogram!("ws_connection_seconds").record(duration.as_secs_f64());
    metrics::gauge!("ws_connections_active").set(active as f64);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("server_errors_total", "kind" => kind).increment(1);
}

pub fn record_query_latency(duration: Duration) {
    metrics::histogram!("voice_query_seconds").record(duration.as_secs_f64());
}
