//! Retry policy for completion calls.
//!
//! One policy instance is applied uniformly at the completion-client
//! boundary; call sites never retry on their own.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff policy for transient completion failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before the failure becomes fatal.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Delay ceiling.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after `failed_attempts` attempts have failed.
    /// Doubles from the initial delay up to the ceiling, so the sequence
    /// is non-decreasing.
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_backoff)
    }
}

/// Run an operation, retrying transient failures per the policy.
///
/// Non-transient errors return immediately; transient errors are retried
/// with exponential backoff until the attempt ceiling, after which the last
/// error becomes fatal.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    "Completion attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, policy.max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
