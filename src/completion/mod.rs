//! Completion client boundary.
//!
//! Everything upstream treats text generation as one opaque primitive:
//! `(prompt, model, max_output_tokens) -> text`. The client owns the
//! token-limit precondition, the retry/backoff policy, and the shared
//! concurrency budget, so no call site can bypass rate discipline by
//! issuing unbounded parallel requests.

mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use retry::{with_retry, RetryPolicy};

use crate::budget::TokenBudget;
use crate::config::Settings;
use crate::error::{FortellError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Opaque completion primitive.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for a prompt.
    ///
    /// Precondition: the prompt must fit the model's input budget after
    /// reserving `max_output_tokens`; implementations raise
    /// [`FortellError::TokenLimit`] instead of silently truncating.
    async fn complete(&self, prompt: &str, model: &str, max_output_tokens: u32) -> Result<String>;
}

/// Production completion client backed by the OpenAI chat API.
pub struct OpenAiCompletion {
    client: async_openai::Client<OpenAIConfig>,
    budget: TokenBudget,
    policy: RetryPolicy,
    permits: Arc<tokio::sync::Semaphore>,
}

impl OpenAiCompletion {
    /// Build a client from settings: timeout, retry policy, model-limit
    /// table, and the shared concurrency budget.
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: crate::openai::create_client_with_timeout(settings.retry.request_timeout()),
            budget: TokenBudget::new(settings.models.limits.clone()),
            policy: settings.retry.policy(),
            permits: Arc::new(tokio::sync::Semaphore::new(
                settings.generation.max_concurrent_calls.max(1),
            )),
        }
    }

    async fn attempt(&self, prompt: &str, model: &str, max_output_tokens: u32) -> Result<String> {
        // One permit per in-flight request; backoff sleeps do not hold a slot.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FortellError::Api {
                message: "request budget closed".to_string(),
                transient: false,
            })?;

        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(fatal)?
                .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .max_completion_tokens(max_output_tokens)
            .build()
            .map_err(fatal)?;

        let response = self.client.chat().create(request).await.map_err(classify)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            // An empty choice usually follows a truncated or filtered
            // response; worth another attempt.
            return Err(FortellError::Api {
                message: format!("empty completion from model {}", model),
                transient: true,
            });
        }

        debug!("Completion from {}: {} chars", model, content.len());
        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(&self, prompt: &str, model: &str, max_output_tokens: u32) -> Result<String> {
        let prompt_tokens = self.budget.estimate(prompt);
        let limits = self.budget.limits(model);
        let input_budget = limits
            .context_window
            .saturating_sub(max_output_tokens as usize);
        if prompt_tokens > input_budget {
            return Err(FortellError::TokenLimit {
                prompt_tokens,
                budget: input_budget,
            });
        }

        with_retry(&self.policy, || {
            self.attempt(prompt, model, max_output_tokens)
        })
        .await
    }
}

/// Map a client-side construction error to a fatal API error.
fn fatal(err: OpenAIError) -> FortellError {
    FortellError::Api {
        message: err.to_string(),
        transient: false,
    }
}

/// Classify an OpenAI error as transient (retryable) or fatal.
fn classify(err: OpenAIError) -> FortellError {
    let transient = match &err {
        // Network failures and timeouts.
        OpenAIError::Reqwest(_) => true,
        OpenAIError::ApiError(api) => {
            let type_transient = matches!(
                api.r#type.as_deref(),
                Some("server_error") | Some("rate_limit_error") | Some("overloaded_error")
            );
            let message = api.message.to_lowercase();
            type_transient
                || message.contains("rate limit")
                || message.contains("overloaded")
                || message.contains("temporarily unavailable")
        }
        _ => false,
    };
    FortellError::Api {
        message: err.to_string(),
        transient,
    }
}

/// Token counts for one completed call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Model the call was sent to.
    pub model: String,
    /// Estimated prompt tokens.
    pub prompt_tokens: usize,
    /// Estimated completion tokens.
    pub completion_tokens: usize,
}

/// Decorator that records per-call token counts for run metadata.
pub struct RecordingClient {
    inner: Arc<dyn CompletionClient>,
    calls: Mutex<Vec<CallRecord>>,
}

impl RecordingClient {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Drain the records accumulated so far.
    pub fn take_records(&self) -> Vec<CallRecord> {
        let mut calls = self.calls.lock().expect("call records poisoned");
        std::mem::take(&mut *calls)
    }
}

#[async_trait]
impl CompletionClient for RecordingClient {
    async fn complete(&self, prompt: &str, model: &str, max_output_tokens: u32) -> Result<String> {
        let text = self.inner.complete(prompt, model, max_output_tokens).await?;
        let record = CallRecord {
            model: model.to_string(),
            prompt_tokens: crate::budget::estimate_tokens(prompt),
            completion_tokens: crate::budget::estimate_tokens(&text),
        };
        self.calls.lock().expect("call records poisoned").push(record);
        Ok(text)
    }
}
