//! Retry configuration, delay calculation, and the shared retry loop.
//!
//! Every network attempt the broker makes goes through [`with_retry()`],
//! keeping the policy in a single place:
//!
//! - `AuthenticationFailed` and `InvalidRequest` return immediately
//! - transient errors (network, 5xx, 429, timeout, empty body) and
//!   `InvalidResponse` are retried up to [`RetryConfig::max_attempts`]
//! - the wait before retry *n* is `n × base_delay`, capped at `max_delay`,
//!   unless the upstream sent a `retry-after` hint
//! - once the cap is reached the last error is returned wrapped in
//!   [`KibitzError::ExhaustedRetries`]

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{KibitzError, Result};

/// Configuration for retry behaviour on retryable errors.
///
/// Uses linear backoff:
///
/// ```rust
/// # use kibitz::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .base_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(3), Duration::from_millis(600));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Delay unit; retry `n` waits `n * base_delay`. Default: 1s.
    pub base_delay: Duration,
    /// Maximum delay between retries. Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay unit.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after the failed attempt numbered `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }

    /// Calculate the effective delay, respecting upstream `retry_after` hints.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an async operation with retry logic.
///
/// `f` is invoked once per attempt; everything that must happen per attempt
/// (rate-limit admission, the call itself, response validation) belongs
/// inside it.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, endpoint: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() => {
                if attempt >= max_attempts {
                    return Err(KibitzError::ExhaustedRetries {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "endpoint" => endpoint.to_owned(),
                )
                .increment(1);
                let delay = config.effective_delay(attempt, e.retry_after());
                warn!(
                    endpoint,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e), // fatal, no retry
        }
    }
}
