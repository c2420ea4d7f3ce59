//! Fixed-window rate limiting per endpoint.
//!
//! Each endpoint has a window `{ count, reset_at }`. A call is admitted and
//! counted while `count < max_requests`; once the window is full, callers
//! sleep until `reset_at` and check again. When the reset time arrives the
//! window restarts in full at `{ count: 1, reset_at: now + window }` for the
//! call that observed it. Capacity is never handed back incrementally.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use crate::telemetry;
use crate::traits::RateLimiter;
use crate::types::RateLimitStats;

/// Endpoint name used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "chat";

/// Configuration for [`WindowRateLimiter`].
///
/// ```rust
/// # use kibitz::RateLimitConfig;
/// # use std::time::Duration;
/// let config = RateLimitConfig::new()
///     .max_requests(60)
///     .window(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Endpoint the broker charges its inference calls to. Default: "chat".
    pub endpoint: String,
    /// Calls admitted per window. Default: 20.
    pub max_requests: u32,
    /// Window length. Default: 60s.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_requests: 20,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint name calls are charged to.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set calls admitted per window.
    pub fn max_requests(mut self, n: u32) -> Self {
        self.max_requests = n;
        self
    }

    /// Set the window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-process [`RateLimiter`] with one fixed window per endpoint name.
pub struct WindowRateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl WindowRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests.max(1),
            window: config.window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit and count a call if the window allows it.
    ///
    /// Returns `Err(reset_at)` when the window is full. The check and the
    /// increment happen under one lock so concurrent callers cannot both
    /// take the last slot.
    pub fn try_acquire(&self, endpoint: &str) -> Result<(), Instant> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        match windows.get_mut(endpoint) {
            Some(w) if now < w.reset_at => {
                if w.count >= self.max_requests {
                    return Err(w.reset_at);
                }
                w.count += 1;
            }
            _ => {
                windows.insert(
                    endpoint.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiter for WindowRateLimiter {
    async fn acquire(&self, endpoint: &str) {
        loop {
            match self.try_acquire(endpoint) {
                Ok(()) => return,
                Err(reset_at) => {
                    let wait = reset_at.saturating_duration_since(Instant::now());
                    warn!(
                        endpoint,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, waiting for window reset"
                    );
                    metrics::counter!(telemetry::RATE_LIMIT_WAITS_TOTAL,
                        "endpoint" => endpoint.to_owned(),
                    )
                    .increment(1);
                    tokio::time::sleep_until(reset_at).await;
                }
            }
        }
    }

    fn stats(&self, endpoint: &str) -> RateLimitStats {
        let now = Instant::now();
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        match windows.get(endpoint) {
            Some(w) if now < w.reset_at => RateLimitStats {
                current_count: w.count,
                time_to_reset: w.reset_at - now,
            },
            _ => RateLimitStats::default(),
        }
    }
}
