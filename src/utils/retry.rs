//! Retry with exponential backoff for flaky data-fetching paths

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Backoff schedule: `min(base_delay * 2^attempt, max_delay)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting (tests)
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds or `policy.max_retries` retries are spent
///
/// Errors that cannot go away on their own (not found, bad input) are
/// returned at once. The last error is returned when every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_retries || !e.is_transient() {
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed: {}, retrying after {}ms (attempt {}/{})",
                    what,
                    e,
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
