//! Default values shared across crates

/// Service endpoints
pub mod endpoints {
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
    pub const DEEPGRAM_DEFAULT: &str = "https://api.deepgram.com";
}

/// Audio format exchanged with clients and providers
pub mod audio {
    pub const SAMPLE_RATE: u32 = 16_000;
    pub const ENCODING: &str = "linear16";
    /// One second of 16-bit mono audio
    pub const BYTES_PER_SECOND: usize = 32_000;
}

/// Query processor wording
pub mod prompts {
    pub const SYSTEM_PROMPT: &str = "You are a helpful retail assistant in a physical store. \
Answer customer questions about products, availability, comparisons, and store navigation. \
Keep responses concise and friendly. If you don't have specific information, say so politely.";

    pub const NO_CONTEXT: &str = "No specific product context available.";

    pub const FALLBACK_RESPONSE: &str =
        "I'm sorry, I'm having trouble processing your request right now. Please try again.";
}

/// Environment variables consulted when keys are absent from config files
pub mod env {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const DEEPGRAM_API_KEY: &str = "DEEPGRAM_API_KEY";
    pub const ENVIRONMENT: &str = "RETAIL_VOICE_ENV";
}
