//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client with the given request timeout.
///
/// A timeout is always set to prevent hung API calls; timed-out requests
/// surface as transient errors and take the normal retry path.
///
/// Honors `LLM_BASE_URL` and `LLM_API_KEY` for OpenAI-compatible endpoints;
/// otherwise the standard `OPENAI_API_KEY` environment variable applies.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    let mut config = OpenAIConfig::default();
    if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
        config = config.with_api_base(base_url);
    }
    if let Ok(api_key) = std::env::var("LLM_API_KEY") {
        if !api_key.is_empty() {
            config = config.with_api_key(api_key);
        }
    }

    Client::with_config(config).with_http_client(http_client)
}
