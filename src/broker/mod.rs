//! Broker facade: the only entry point callers use.
//!
//! ```text
//!  caller ──submit──► RequestQueue ──pop_batch──► scheduler (background task)
//!     ▲                                               │  per item, concurrently:
//!     │                                               ├─ prediction / similarity / exact tiers
//!     │                                               ├─ RateLimiter::acquire
//!     │                                               ├─ InferenceClient::complete (+ retry)
//!     │                                               └─ ResponseCache::record
//!     └──────────── PendingResponse ◄──── resolved exactly once
//! ```

mod builder;
mod queue;
mod scheduler;

pub use builder::{BrokerBuilder, BrokerConfig, Kibitz};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::sync::{Notify, oneshot};
use tracing::debug;

use queue::RequestQueue;

use crate::cache::ResponseCache;
use crate::providers::InferenceClient;
use crate::telemetry;
use crate::traits::{FeatureExtractor, RateLimiter, ResponseValidator};
use crate::types::{CacheStats, Completion, RateLimitStats, SubmitOptions};
use crate::{KibitzError, Result};

/// State shared between broker handles and the scheduler task.
struct BrokerInner {
    config: BrokerConfig,
    queue: RequestQueue,
    cache: ResponseCache,
    limiter: Arc<dyn RateLimiter>,
    client: Arc<dyn InferenceClient>,
    extractor: Arc<dyn FeatureExtractor>,
    validator: Arc<dyn ResponseValidator>,
    wake: Arc<Notify>,
}

/// Handle to a running broker.
///
/// Cheap to clone; all clones share one queue, cache and limiter. The
/// background scheduler stops once every handle has been dropped, and any
/// requests still queued at that point resolve with
/// [`KibitzError::Shutdown`].
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// Queue a prompt and return a handle that resolves exactly once.
    ///
    /// Never blocks. Invalid input (empty prompt, out-of-range options)
    /// resolves the handle immediately with [`KibitzError::InvalidInput`].
    pub fn submit(&self, prompt: impl Into<String>, options: SubmitOptions) -> PendingResponse {
        let prompt = prompt.into();
        let (tx, rx) = oneshot::channel();

        if let Err(e) = validate_submission(&prompt, &options) {
            let _ = tx.send(Err(e));
            return PendingResponse::new(rx);
        }

        let priority = options.priority;
        let queue_len = self.inner.queue.push(prompt, options, tx);
        metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue_len as f64);
        debug!(priority, queue_len, "request enqueued");
        self.inner.wake.notify_one();

        PendingResponse::new(rx)
    }

    /// Submit and wait for the result.
    pub async fn ask(&self, prompt: impl Into<String>, options: SubmitOptions) -> Result<Completion> {
        self.submit(prompt, options).await
    }

    /// Empty the exact, similarity and prediction tiers.
    ///
    /// The queue and rate-limit windows are left alone.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Point-in-time view of the cache tiers and queue.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            queue_length: self.inner.queue.len(),
            ..self.inner.cache.stats()
        }
    }

    /// Point-in-time view of the configured endpoint's rate-limit window.
    pub fn rate_limit_stats(&self) -> RateLimitStats {
        self.inner
            .limiter
            .stats(&self.inner.config.rate_limit.endpoint)
    }

    /// Requests waiting for dispatch.
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// The configuration this broker runs with.
    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Direct access to the cache tiers, e.g. to inspect a stored entry.
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }
}

fn validate_submission(prompt: &str, options: &SubmitOptions) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(KibitzError::InvalidInput("prompt is empty".into()));
    }
    options.validate()
}

pin_project! {
    /// Future returned by [`Broker::submit`].
    ///
    /// Resolves to the completion or the terminal error for the request.
    /// Dropping it, or calling [`cancel`](Self::cancel), tells the scheduler
    /// to skip the request if it has not been dispatched yet; a call already
    /// in flight runs to completion and its result is discarded.
    #[must_use = "a submitted request is only observable through its PendingResponse"]
    pub struct PendingResponse {
        #[pin]
        rx: oneshot::Receiver<Result<Completion>>,
        cancelled: bool,
    }
}

impl PendingResponse {
    fn new(rx: oneshot::Receiver<Result<Completion>>) -> Self {
        Self {
            rx,
            cancelled: false,
        }
    }

    /// Withdraw the request.
    ///
    /// Awaiting the handle afterwards yields [`KibitzError::Cancelled`]
    /// unless a result had already been delivered.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.rx.close();
    }
}

impl Future for PendingResponse {
    type Output = Result<Completion>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let cancelled = *this.cancelled;
        this.rx.poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(if cancelled {
                    KibitzError::Cancelled
                } else {
                    KibitzError::Shutdown
                })
            })
        })
    }
}
