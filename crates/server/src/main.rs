//! Retail Voice Server Entry Point

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use retail_voice_config::{constants, load_settings, Settings, YamlCatalog};
use retail_voice_core::ProductCatalog;
use retail_voice_llm::{OpenAIBackend, OpenAIConfig};
use retail_voice_pipeline::{
    stt::DeepgramSttConfig, tts::DeepgramTtsConfig, DeepgramRecognizer, DeepgramSynthesizer,
};
use retail_voice_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var(constants::env::ENVIRONMENT).ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);
    tracing::info!("Starting Retail Voice Server v{}", env!("CARGO_PKG_VERSION"));

    let catalog: Arc<dyn ProductCatalog> = match YamlCatalog::load(&config.catalog_path) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            tracing::warn!(
                path = %config.catalog_path,
                error = %e,
                "Product catalog unavailable, product ids will not be resolved"
            );
            Arc::new(YamlCatalog::default())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(config.providers.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let recognition = Arc::new(DeepgramRecognizer::new(
        DeepgramSttConfig::from(&config.providers),
        client.clone(),
    ));
    let synthesis = Arc::new(DeepgramSynthesizer::new(
        DeepgramTtsConfig::from(&config.providers),
        client,
    ));
    let generator = Arc::new(
        OpenAIBackend::new(OpenAIConfig::from(&config.query))
            .context("Failed to build LLM backend")?,
    );

    if config.providers.deepgram_api_key.is_none() {
        tracing::warn!("Deepgram API key not configured, speech sessions will fail to start");
    }
    if config.query.api_key.is_none() {
        tracing::warn!("OpenAI API key not configured, queries will use the fallback answer");
    }

    let mut state = AppState::new(config.clone(), recognition, synthesis, generator, catalog);
    if config.observability.metrics_enabled {
        if let Some(handle) = init_metrics() {
            tracing::info!("Initialized Prometheus metrics at /metrics");
            state = state.with_metrics(handle);
        }
    }
    let sessions = state.sessions.clone();

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    tracing::info!(ws_path = %config.server.ws_path, "Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open WebSockets keep the server alive until their sessions stop
            sessions.terminate_all();
        })
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!(
            "retail_voice_server={level},retail_voice_pipeline={level},retail_voice_llm={level},\
             retail_voice_config={level},tower_http=debug"
        )
        .into()
    });

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
