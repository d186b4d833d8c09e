//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::error::{FortellError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Article generation requires an API key.
    Generate,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Generate => check_api_key(),
    }
}

/// Check that an LLM API key is configured.
///
/// `LLM_API_KEY` takes precedence; `OPENAI_API_KEY` is the fallback.
fn check_api_key() -> Result<()> {
    let configured = ["LLM_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false));

    if configured {
        Ok(())
    } else {
        Err(FortellError::Config(
            "No API key found. Set LLM_API_KEY or OPENAI_API_KEY.".to_string(),
        ))
    }
}
