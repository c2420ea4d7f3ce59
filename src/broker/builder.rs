//! Builder for configuring broker instances

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use super::queue::RequestQueue;
use super::{Broker, BrokerInner, scheduler};
use crate::cache::{CacheConfig, ResponseCache};
use crate::limiter::{RateLimitConfig, WindowRateLimiter};
use crate::poker::{DEFAULT_SYSTEM_PROMPT, PokerAdviceValidator, PokerFeatureExtractor};
use crate::providers::{InferenceClient, RetryConfig};
use crate::traits::{FeatureExtractor, RateLimiter, ResponseValidator};
use crate::{KibitzError, Result};

/// Tunables for a broker instance.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Requests dispatched concurrently per cycle. Default: 5.
    pub batch_size: usize,
    /// Idle wake-up interval of the scheduler. Default: 100ms.
    pub poll_interval: Duration,
    /// Upper bound on a single inference call. Default: 30s.
    pub request_timeout: Duration,
    /// Model used when a submission does not name one. Default: `gpt-4o`.
    pub default_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub default_presence_penalty: f32,
    pub default_frequency_penalty: f32,
    /// System message sent ahead of every prompt.
    pub system_prompt: String,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            poll_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
            default_model: "gpt-4o".to_string(),
            default_temperature: 0.7,
            default_max_tokens: 150,
            default_presence_penalty: 0.1,
            default_frequency_penalty: 0.1,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Main entry point for creating broker instances.
pub struct Kibitz;

impl Kibitz {
    /// Create a new builder for configuring the broker.
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::new()
    }
}

/// Builder for configuring broker instances.
///
/// Only the inference client is required. Feature extraction and response
/// validation default to the poker implementations; the rate limiter
/// defaults to a fixed-window limiter built from the rate-limit config.
pub struct BrokerBuilder {
    config: BrokerConfig,
    client: Option<Arc<dyn InferenceClient>>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
    validator: Option<Arc<dyn ResponseValidator>>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl BrokerBuilder {
    pub fn new() -> Self {
        Self {
            config: BrokerConfig::default(),
            client: None,
            extractor: None,
            validator: None,
            limiter: None,
        }
    }

    /// Set the inference client.
    pub fn client(mut self, client: impl InferenceClient + 'static) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Set a shared inference client.
    pub fn shared_client(mut self, client: Arc<dyn InferenceClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Configure the bundled OpenAI client with the given key.
    #[cfg(feature = "openai")]
    pub fn openai(self, api_key: impl Into<String>) -> Result<Self> {
        let client = crate::providers::OpenAiClient::new(api_key)?;
        Ok(self.client(client))
    }

    /// Replace the prompt feature extractor.
    pub fn feature_extractor(mut self, extractor: impl FeatureExtractor + 'static) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// Replace the response validator.
    pub fn response_validator(mut self, validator: impl ResponseValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Replace the rate limiter.
    pub fn rate_limiter(mut self, limiter: impl RateLimiter + 'static) -> Self {
        self.limiter = Some(Arc::new(limiter));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the number of requests dispatched per cycle.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the per-call timeout applied around the inference client.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn default_temperature(mut self, temperature: f32) -> Self {
        self.config.default_temperature = temperature;
        self
    }

    pub fn default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.default_max_tokens = max_tokens;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Build the broker and start its scheduler on the current Tokio runtime.
    pub fn build(self) -> Result<Broker> {
        let client = self
            .client
            .ok_or_else(|| KibitzError::Configuration("no inference client configured".into()))?;
        let config = self.config;

        if config.batch_size == 0 {
            return Err(KibitzError::Configuration(
                "batch_size must be at least 1".into(),
            ));
        }
        if config.poll_interval.is_zero() {
            return Err(KibitzError::Configuration(
                "poll_interval must be non-zero".into(),
            ));
        }
        if config.request_timeout.is_zero() {
            return Err(KibitzError::Configuration(
                "request_timeout must be non-zero".into(),
            ));
        }
        if config.rate_limit.max_requests == 0 {
            return Err(KibitzError::Configuration(
                "rate limit must admit at least one request per window".into(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            KibitzError::Configuration("broker must be built inside a Tokio runtime".into())
        })?;

        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(WindowRateLimiter::new(&config.rate_limit)));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(PokerFeatureExtractor));
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(PokerAdviceValidator));
        let wake = Arc::new(Notify::new());

        info!(
            client = client.name(),
            batch_size = config.batch_size,
            max_requests = config.rate_limit.max_requests,
            window_secs = config.rate_limit.window.as_secs(),
            "broker starting"
        );

        let inner = Arc::new(BrokerInner {
            cache: ResponseCache::new(&config.cache),
            queue: RequestQueue::new(),
            limiter,
            client,
            extractor,
            validator,
            wake: wake.clone(),
            config,
        });

        runtime.spawn(scheduler::run(
            Arc::downgrade(&inner),
            wake,
            inner.config.poll_interval,
        ));

        Ok(Broker { inner })
    }
}

impl Default for BrokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
