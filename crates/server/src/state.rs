//! Application State
//!
//! Shared state across all handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use std::sync::Arc;

use retail_voice_config::Settings;
use retail_voice_core::{ProductCatalog, RecognitionProvider, SynthesisProvider, TextGenerator};
use retail_voice_llm::QueryProcessor;
use retail_voice_pipeline::OrchestratorDeps;

use crate::session::SessionRegistry;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub sessions: Arc<SessionRegistry>,
    pub recognition: Arc<dyn RecognitionProvider>,
    pub synthesis: Arc<dyn SynthesisProvider>,
    pub processor: Arc<QueryProcessor>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Settings,
        recognition: Arc<dyn RecognitionProvider>,
        synthesis: Arc<dyn SynthesisProvider>,
        generator: Arc<dyn TextGenerator>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        let processor = Arc::new(QueryProcessor::new(generator, &config.query));
        Self {
            sessions: Arc::new(SessionRegistry::new(config.server.max_sessions)),
            config: Arc::new(RwLock::new(config)),
            recognition,
            synthesis,
            processor,
            catalog,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Capability handles for one new session
    pub fn orchestrator_deps(&self) -> OrchestratorDeps {
        OrchestratorDeps {
            recognition: Arc::clone(&self.recognition),
            synthesis: Arc::clone(&self.synthesis),
            responder: self.processor.clone(),
            catalog: Arc::clone(&self.catalog),
            config: self.config.read().pipeline.clone(),
        }
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }
}
