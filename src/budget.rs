//! Token budget estimation for strategy selection.
//!
//! Token counts here gate which generation strategy a run takes; they are
//! deliberately conservative (never underestimating) so an oversized prompt
//! is caught before the API call, not silently truncated by it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Known context/output limits for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelLimits {
    /// Total context window in tokens (input + output).
    pub context_window: usize,
    /// Maximum tokens a single completion may produce.
    pub max_output_tokens: usize,
}

/// Limits assumed for models absent from the configuration table.
pub const FALLBACK_LIMITS: ModelLimits = ModelLimits {
    context_window: 128_000,
    max_output_tokens: 4_096,
};

/// Assumed characters per token. Real tokenizers average closer to four
/// characters per token for prose, so dividing by three overestimates.
pub(crate) const CHARS_PER_TOKEN: usize = 3;

/// Token budget table for strategy gating.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    limits: HashMap<String, ModelLimits>,
}

impl TokenBudget {
    /// Create a budget from a model-limits table.
    pub fn new(limits: HashMap<String, ModelLimits>) -> Self {
        Self { limits }
    }

    /// Conservative token estimate for a string.
    pub fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    /// Look up limits for a model, falling back to defaults for unknown names.
    pub fn limits(&self, model: &str) -> ModelLimits {
        self.limits.get(model).copied().unwrap_or(FALLBACK_LIMITS)
    }

    /// Tokens available for prompt input after reserving the output window
    /// and a fixed overhead for instructions.
    pub fn available_input(&self, model: &str, overhead_tokens: usize) -> usize {
        let limits = self.limits(model);
        limits
            .context_window
            .saturating_sub(limits.max_output_tokens)
            .saturating_sub(overhead_tokens)
    }
}

/// Conservative token estimate: one token per three characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Default model-limits table.
///
/// Mirrors published context windows; unknown models fall back to
/// [`FALLBACK_LIMITS`].
pub fn default_limits() -> HashMap<String, ModelLimits> {
    let entries: [(&str, usize, usize); 9] = [
        ("gpt-4.1", 1_047_576, 32_768),
        ("gpt-4.1-mini", 1_047_576, 32_768),
        ("gpt-4.1-nano", 1_047_576, 32_768),
        ("gpt-4o", 128_000, 32_768),
        ("gpt-4o-mini", 128_000, 16_384),
        ("gpt-4-turbo", 128_000, 32_768),
        ("gpt-3.5-turbo-0125", 16_000, 4_096),
        ("gpt-5.2", 128_000, 64_000),
        ("gpt-5-mini", 128_000, 64_000),
    ];

    entries
        .into_iter()
        .map(|(name, context_window, max_output_tokens)| {
            (
                name.to_string(),
                ModelLimits {
                    context_window,
                    max_output_tokens,
                },
            )
        })
        .collect()
}
