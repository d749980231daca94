//! Transcript finality policies

use retail_voice_config::FinalityMode;

/// Terminal punctuation check used by the heuristic policy
pub fn ends_with_terminal_punctuation(text: &str) -> bool {
    matches!(text.trim_end().chars().last(), Some('.' | '!' | '?'))
}

/// Tracks whether the latest partial has stopped changing
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    window: usize,
    last: Option<String>,
    stable_polls: usize,
}

impl StabilityTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            last: None,
            stable_polls: 0,
        }
    }

    /// Record one poll of `text`; returns true once the text counts as final
    pub fn observe(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            self.reset();
            return false;
        }
        if ends_with_terminal_punctuation(text) {
            return true;
        }

        let stable = self
            .last
            .as_deref()
            .map(|prev| prev == text || prev.contains(text) || text.contains(prev))
            .unwrap_or(false);

        self.stable_polls = if stable { self.stable_polls + 1 } else { 1 };
        self.last = Some(text.to_string());
        self.stable_polls >= self.window
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.stable_polls = 0;
    }
}

/// Exactly one of these decides finality for a recognizer instance
#[derive(Debug, Clone)]
pub enum FinalityPolicy {
    /// Trust the provider's `is_final` flag, ignore punctuation
    Native,
    /// Ignore provider flags, use punctuation or stability
    Heuristic(StabilityTracker),
}

impl FinalityPolicy {
    /// Resolve the configured mode against what the provider supports
    pub fn resolve(mode: FinalityMode, provider_native: bool, stability_polls: usize) -> Self {
        match mode {
            FinalityMode::Native => FinalityPolicy::Native,
            FinalityMode::Heuristic => {
                FinalityPolicy::Heuristic(StabilityTracker::new(stability_polls))
            }
            FinalityMode::Auto if provider_native => FinalityPolicy::Native,
            FinalityMode::Auto => FinalityPolicy::Heuristic(StabilityTracker::new(stability_polls)),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, FinalityPolicy::Native)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FinalityPolicy::Native => "native",
            FinalityPolicy::Heuristic(_) => "heuristic",
        }
    }

    pub fn reset(&mut self) {
        if let FinalityPolicy::Heuristic(tracker) = self {
            tracker.reset();
        }
    }
}
