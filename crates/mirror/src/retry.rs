// Retry utility: fixed-backoff retry loop shared by segment and key downloads.

use crate::error::MirrorError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between a failed attempt and the next one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

/// Execute an async operation until it succeeds or the policy is exhausted.
///
/// The `operation` closure receives the current attempt number (1-indexed).
/// Every error is treated as transient; the error of the final attempt is
/// returned once `max_attempts` have been made. A policy with zero attempts
/// still runs the operation once.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, MirrorError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, MirrorError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                debug!(
                    attempt,
                    max = max_attempts,
                    delay_ms = policy.backoff.as_millis() as u64,
                    error = %err,
                    "Retrying after failed attempt"
                );
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
                attempt += 1;
            }
        }
    }
}
