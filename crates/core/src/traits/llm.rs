//! Language model traits

use crate::{GenerateRequest, QueryContext, Result, TextChunk};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Lazy, finite sequence of response chunks
pub type TextChunkStream = Pin<Box<dyn Stream<Item = TextChunk> + Send + 'static>>;

/// Chat completion backend
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    /// Generate a complete response
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Stream tokens into `tx` as they arrive; returns the full text
    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        tx: mpsc::Sender<String>,
    ) -> Result<String>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Turns finalized utterances into response chunks
pub trait ResponseGenerator: Send + Sync + 'static {
    /// One forward generation pass split into sentence chunks
    ///
    /// Never fails: generation errors surface as a single fallback chunk.
    fn stream_response(&self, utterance: &str, context: &QueryContext) -> TextChunkStream;

    /// Instant best-effort answer for a partial utterance
    fn quick_reply(&self, partial: &str, context: &QueryContext) -> Option<String>;
}
