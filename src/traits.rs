//! Seams the broker is assembled from.
//!
//! The broker owns its queue and cache tiers, but everything that encodes
//! domain knowledge or touches shared quota sits behind a trait so tests
//! (and other strategy layers) can substitute their own:
//!
//! - [`FeatureExtractor`]: derives [`FeatureSet`] tags from prompt text
//! - [`ResponseValidator`]: decides whether a completion is usable advice
//! - [`RateLimiter`]: admits or delays calls per endpoint
//!
//! The network seam, [`InferenceClient`](crate::providers::InferenceClient),
//! lives with the provider implementations.

use async_trait::async_trait;

use crate::Result;
use crate::types::{FeatureSet, RateLimitStats};

/// Pure function from prompt text to domain tags.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, prompt: &str) -> FeatureSet;
}

/// Accepts or rejects completion content before it is cached or returned.
pub trait ResponseValidator: Send + Sync {
    /// Return [`KibitzError::InvalidResponse`](crate::KibitzError::InvalidResponse)
    /// when the content is not usable.
    fn validate(&self, content: &str) -> Result<()>;
}

/// Per-endpoint admission control.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until a call to `endpoint` is permitted, then count it.
    ///
    /// Never fails: an exhausted window delays the caller instead.
    async fn acquire(&self, endpoint: &str);

    /// Current window for `endpoint`, without counting a call.
    fn stats(&self, endpoint: &str) -> RateLimitStats;
}
