//! Background batch scheduler and per-request dispatch.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::BrokerInner;
use super::queue::QueuedRequest;
use crate::providers::{InferenceRequest, with_retry};
use crate::telemetry;
use crate::types::{Completion, Message, ResponseSource, SubmitOptions};
use crate::{KibitzError, Result};

/// Scheduling loop.
///
/// Wakes on every enqueue and on a fixed tick, then drains the queue one
/// batch at a time. Holds only a weak reference between cycles so the
/// loop ends once the last [`Broker`](super::Broker) handle is dropped.
pub(crate) async fn run(inner: Weak<BrokerInner>, wake: Arc<Notify>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(poll_ms = poll_interval.as_millis() as u64, "scheduler started");

    loop {
        tokio::select! {
            _ = wake.notified() => {}
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.drain().await;
    }

    info!("scheduler stopped");
}

impl BrokerInner {
    /// Dispatch batches until the queue is empty.
    ///
    /// Items in a batch run concurrently; the next batch is taken only
    /// after every item of the current one has settled, which bounds
    /// outbound calls to the batch size.
    async fn drain(&self) {
        loop {
            let batch = self.queue.pop_batch(self.config.batch_size);
            let queue_len = self.queue.len();
            metrics::gauge!(telemetry::QUEUE_DEPTH).set(queue_len as f64);
            if batch.is_empty() {
                return;
            }
            metrics::histogram!(telemetry::BATCH_SIZE).record(batch.len() as f64);
            debug!(batch_size = batch.len(), queue_len, "dispatching batch");
            join_all(batch.into_iter().map(|request| self.dispatch(request))).await;
        }
    }

    async fn dispatch(&self, request: QueuedRequest) {
        if request.responder.is_closed() {
            warn!(priority = request.priority, "request cancelled before dispatch");
            return;
        }
        let waited = request.enqueued_at.elapsed();
        let start = Instant::now();
        let result = self.resolve(&request.prompt, &request.options).await;

        let (source, status) = match &result {
            Ok(completion) => (completion.source.as_str(), "ok"),
            Err(_) => (ResponseSource::Network.as_str(), "error"),
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL, "source" => source, "status" => status)
            .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "source" => source)
            .record(start.elapsed().as_secs_f64());
        debug!(
            source,
            status,
            priority = request.priority,
            waited_ms = waited.as_millis() as u64,
            "request resolved"
        );

        if request.responder.send(result).is_err() {
            debug!("caller dropped its handle before resolution");
        }
    }

    /// Cache tiers first (unless bypassed), then the network.
    #[instrument(skip_all, fields(bypass_cache = options.bypass_cache))]
    pub(crate) async fn resolve(&self, prompt: &str, options: &SubmitOptions) -> Result<Completion> {
        let features = self.extractor.extract(prompt);

        if !options.bypass_cache {
            if let Some(completion) = self.cache.lookup(prompt, &features) {
                return Ok(completion);
            }
        }

        let request = self.build_request(prompt, options);
        let endpoint = self.config.rate_limit.endpoint.as_str();
        let content = with_retry(&self.config.retry, endpoint, || self.attempt(&request)).await?;

        self.cache.record(prompt, &features, &content);
        Ok(Completion::new(content, ResponseSource::Network))
    }

    /// One network attempt: admission, bounded call, validation.
    async fn attempt(&self, request: &InferenceRequest) -> Result<String> {
        self.limiter.acquire(&self.config.rate_limit.endpoint).await;

        let timeout = self.config.request_timeout;
        let content = tokio::time::timeout(timeout, self.client.complete(request))
            .await
            .map_err(|_| KibitzError::Timeout(timeout))??;

        if content.trim().is_empty() {
            return Err(KibitzError::EmptyResponse);
        }
        self.validator.validate(&content)?;
        Ok(content)
    }

    fn build_request(&self, prompt: &str, options: &SubmitOptions) -> InferenceRequest {
        let config = &self.config;
        InferenceRequest {
            messages: vec![
                Message::system(config.system_prompt.as_str()),
                Message::user(prompt),
            ],
            model: options
                .model
                .clone()
                .unwrap_or_else(|| config.default_model.clone()),
            temperature: options.temperature.unwrap_or(config.default_temperature),
            max_tokens: options.max_tokens.unwrap_or(config.default_max_tokens),
            presence_penalty: options
                .presence_penalty
                .unwrap_or(config.default_presence_penalty),
            frequency_penalty: options
                .frequency_penalty
                .unwrap_or(config.default_frequency_penalty),
        }
    }
}
