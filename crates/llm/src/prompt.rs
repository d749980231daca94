//! Prompt construction

use retail_voice_config::{constants::prompts, QueryConfig};
use retail_voice_core::{GenerateRequest, QueryContext};

/// Builds chat requests from an utterance and its store/product context
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for PromptBuilder {
    fn from(config: &QueryConfig) -> Self {
        Self {
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl PromptBuilder {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Context block lines, one fact per line
    pub fn context_block(context: &QueryContext) -> String {
        let mut lines = Vec::new();

        if let Some(product) = &context.product {
            match (&product.name, &product.brand) {
                (Some(name), Some(brand)) => lines.push(format!("Current product: {} by {}", name, brand)),
                (Some(name), None) => lines.push(format!("Current product: {}", name)),
                _ => {}
            }
            if let Some(price) = product.price_display() {
                lines.push(format!("Price: {}", price));
            }
            if let Some(ingredients) = product.ingredients.as_deref().filter(|i| !i.is_empty()) {
                lines.push(format!("Ingredients: {}", ingredients));
            }
            if let Some(location) = &product.shelf_location {
                lines.push(format!("Location: {}", location));
            }
            if let Some(stock) = product.stock {
                lines.push(format!("Stock: {} units available", stock));
            }
        }
        if let Some(store_id) = &context.store_id {
            lines.push(format!("Store ID: {}", store_id));
        }

        if lines.is_empty() {
            prompts::NO_CONTEXT.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// User message carrying the context block and the question
    pub fn user_message(utterance: &str, context: &QueryContext) -> String {
        format!(
            "Context:\n{}\n\nCustomer question: {}",
            Self::context_block(context),
            utterance.trim()
        )
    }

    pub fn build(&self, utterance: &str, context: &QueryContext, stream: bool) -> GenerateRequest {
        GenerateRequest::new(self.system_prompt.clone())
            .with_user_message(Self::user_message(utterance, context))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_streaming(stream)
    }
}
