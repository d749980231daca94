//! Query processor
//!
//! Turns a finalized utterance into a stream of sentence chunks, and answers
//! partial utterances from product context when a keyword matches.

use async_stream::stream;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use retail_voice_config::{constants::prompts, QueryConfig};
use retail_voice_core::{
    ProductContext, QueryContext, ResponseGenerator, TextChunk, TextChunkStream, TextGenerator,
};

use crate::{PromptBuilder, SentenceChunker};

/// Tokens buffered between the backend and the chunker
const TOKEN_BUFFER: usize = 64;

const LOCATION_KEYWORDS: &[&str] = &["where", "location", "aisle", "find", "shelf"];
const PRICE_KEYWORDS: &[&str] = &["price", "cost", "how much"];
const STOCK_KEYWORDS: &[&str] = &["stock", "available", "availability", "have any"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Location,
    Price,
    Stock,
}

impl Intent {
    fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if matches(LOCATION_KEYWORDS) {
            Some(Intent::Location)
        } else if matches(PRICE_KEYWORDS) {
            Some(Intent::Price)
        } else if matches(STOCK_KEYWORDS) {
            Some(Intent::Stock)
        } else {
            None
        }
    }

    fn answer(self, product: &ProductContext) -> Option<String> {
        let name = product.display_name();
        match self {
            Intent::Location => product
                .shelf_location
                .as_ref()
                .map(|location| format!("{} is in {}.", name, location)),
            Intent::Price => product
                .price_display()
                .map(|price| format!("{} costs {} rupees.", name, price)),
            Intent::Stock => product.stock.map(|stock| {
                if stock > 0 {
                    format!("Yes, we have {} units of {} in stock.", stock, name)
                } else {
                    format!("{} is currently out of stock.", name)
                }
            }),
        }
    }
}

/// Response generator backed by a text completion backend
pub struct QueryProcessor {
    generator: Arc<dyn TextGenerator>,
    prompt: PromptBuilder,
    quick_reply_min_chars: usize,
}

impl QueryProcessor {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &QueryConfig) -> Self {
        Self {
            generator,
            prompt: PromptBuilder::from(config),
            quick_reply_min_chars: config.quick_reply_min_chars,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// Non-streaming answer, falling back to the apology on failure
    pub async fn answer(&self, utterance: &str, context: &QueryContext) -> String {
        let request = self.prompt.build(utterance, context, false);
        match self.generator.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => prompts::FALLBACK_RESPONSE.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, model = self.generator.model_name(), "Generation failed");
                metrics::counter!("llm_errors_total").increment(1);
                prompts::FALLBACK_RESPONSE.to_string()
            }
        }
    }
}

impl ResponseGenerator for QueryProcessor {
    fn stream_response(&self, utterance: &str, context: &QueryContext) -> TextChunkStream {
        let request = self.prompt.build(utterance, context, true);
        let generator = Arc::clone(&self.generator);

        Box::pin(stream! {
            let started = Instant::now();
            let (tx, mut rx) = mpsc::channel::<String>(TOKEN_BUFFER);
            let mut chunker = SentenceChunker::new();
            let mut index = 0usize;
            let mut outcome = None;

            {
                let generation = generator.generate_stream(&request, tx);
                tokio::pin!(generation);

                loop {
                    let token = tokio::select! {
                        token = rx.recv() => token,
                        result = &mut generation, if outcome.is_none() => {
                            let failed = result.is_err();
                            outcome = Some(result);
                            if failed {
                                break;
                            }
                            continue;
                        }
                    };
                    let Some(token) = token else {
                        break;
                    };
                    for sentence in chunker.push(&token) {
                        if index == 0 {
                            metrics::histogram!("llm_first_chunk_seconds")
                                .record(started.elapsed().as_secs_f64());
                        }
                        yield TextChunk::new(index, sentence);
                        index += 1;
                    }
                }

                if outcome.is_none() {
                    outcome = Some(generation.await);
                }
            }

            match outcome {
                Some(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        model = generator.model_name(),
                        chunks_sent = index,
                        "Generation failed, sending fallback"
                    );
                    metrics::counter!("llm_errors_total").increment(1);
                    yield TextChunk::new(index, prompts::FALLBACK_RESPONSE);
                }
                _ => {
                    if let Some(rest) = chunker.flush() {
                        yield TextChunk::new(index, rest);
                    }
                }
            }
        })
    }

    fn quick_reply(&self, partial: &str, context: &QueryContext) -> Option<String> {
        let partial = partial.trim();
        if partial.chars().count() <= self.quick_reply_min_chars {
            return None;
        }
        let product = context.product.as_ref()?;
        Intent::detect(partial)?.answer(product)
    }
}
