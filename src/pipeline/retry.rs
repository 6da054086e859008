//! Outer exponential-backoff retrier.
//!
//! An explicit loop with an iteration counter and a doubling delay,
//! capped at the configured maximum. After the final retry the last
//! underlying error surfaces wrapped in `RetriesExhausted`.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::RetryConfig;

/// Backoff schedule for the retrier.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First delay; doubles on each subsequent retry
    pub initial_delay: Duration,
    /// Delay cap
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based): `initial * 2^retry`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        let delay = self.initial_delay.saturating_mul(factor.min(u32::MAX as u64) as u32);
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `operation` under the policy: one initial attempt plus up to
/// `max_retries` retries, sleeping the scheduled delay between attempts.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for retry in 0..=policy.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if retry == policy.max_retries {
                    return Err(AppError::RetriesExhausted {
                        last: Box::new(error),
                    });
                }
                let delay = policy.delay_for(retry);
                log::info!(
                    "Retrying after {}ms. Attempts remaining: {} ({})",
                    delay.as_millis(),
                    policy.max_retries - retry,
                    error
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    unreachable!("loop always returns")
}
