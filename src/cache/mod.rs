//! Three-tier response cache.
//!
//! Lookups run in a fixed order and stop at the first hit:
//!
//! 1. **Prediction**: the last response seen for the prompt's
//!    `street_position_action` key. Heuristic; may be stale.
//! 2. **Similarity**: a previously answered prompt in the same
//!    `(street, position)` bucket whose token-set Jaccard similarity exceeds
//!    [`CacheConfig::similarity_threshold`], provided its exact entry is
//!    still live.
//! 3. **Exact**: the entry for the normalized prompt, served only when the
//!    features it was stored with match the current prompt's features, so
//!    an exact entry never answers for a prompt holding different cards.
//!
//! The feature guard belongs to the exact tier only. The similarity tier
//! compares `(street, position)` and token overlap, so with a threshold
//! below 1.0 a prompt that differs only in its hand can be served from the
//! similarity tier.
//!
//! A successful network response is written to all three tiers by
//! [`ResponseCache::record`].

mod exact;
mod prediction;
mod similarity;

pub use similarity::jaccard_similarity;

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use exact::ExactCache;
use prediction::PredictionStore;
use similarity::SimilarityIndex;

use crate::telemetry;
use crate::types::{CacheStats, Completion, FeatureSet, ResponseSource};

/// Configuration for the response cache.
///
/// ```rust
/// # use kibitz::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(600))
///     .similarity_threshold(0.9);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of exact entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for exact entries. Default: 1 hour.
    pub ttl: Duration,
    /// Jaccard score a candidate must exceed to be reused. Default: 0.8.
    pub similarity_threshold: f64,
    /// Prompts kept per similarity bucket, oldest dropped first. Default: 256.
    pub max_bucket_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
            similarity_threshold: 0.8,
            max_bucket_len: 256,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of exact entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for exact entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the similarity threshold.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the per-bucket prompt limit.
    pub fn max_bucket_len(mut self, n: usize) -> Self {
        self.max_bucket_len = n;
        self
    }
}

/// A stored exact-tier response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub normalized_key: String,
    pub content: String,
    pub created_at: Instant,
    pub features: FeatureSet,
}

/// Normalize a prompt into its exact-tier key: trimmed, lower-cased, with
/// runs of whitespace collapsed to a single space.
pub fn normalize_prompt(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// In-memory exact, similarity and prediction tiers.
pub struct ResponseCache {
    config: CacheConfig,
    exact: ExactCache,
    similarity: SimilarityIndex,
    predictions: PredictionStore,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            exact: ExactCache::new(config.max_entries, config.ttl),
            similarity: SimilarityIndex::new(config.max_bucket_len),
            predictions: PredictionStore::new(),
            config: config.clone(),
        }
    }

    /// Run the three tiers in order and return the first hit.
    pub fn lookup(&self, prompt: &str, features: &FeatureSet) -> Option<Completion> {
        if let Some(content) = self.predict(features) {
            return Some(Completion::new(content, ResponseSource::Prediction));
        }
        if let Some(content) = self.find_similar(prompt, features) {
            return Some(Completion::new(content, ResponseSource::Similarity));
        }
        self.get_exact(prompt, features)
            .map(|content| Completion::new(content, ResponseSource::Exact))
    }

    /// Prediction tier.
    pub fn predict(&self, features: &FeatureSet) -> Option<String> {
        let hit = features
            .prediction_key()
            .and_then(|key| self.predictions.get(&key));
        record_lookup("prediction", hit.is_some());
        hit
    }

    /// Similarity tier.
    pub fn find_similar(&self, prompt: &str, features: &FeatureSet) -> Option<String> {
        let candidates = self.similarity.candidates(
            &features.bucket_key(),
            prompt,
            self.config.similarity_threshold,
        );
        let hit = candidates
            .iter()
            .find_map(|candidate| self.exact.get(&normalize_prompt(candidate)))
            .map(|entry| entry.content);
        record_lookup("similarity", hit.is_some());
        hit
    }

    /// Exact tier, guarded by a feature match.
    pub fn get_exact(&self, prompt: &str, features: &FeatureSet) -> Option<String> {
        let hit = self
            .exact
            .get(&normalize_prompt(prompt))
            .filter(|entry| {
                let same = entry.features.matches(features);
                if !same {
                    debug!(key = %entry.normalized_key, "exact entry ignored: features differ");
                }
                same
            })
            .map(|entry| entry.content);
        record_lookup("exact", hit.is_some());
        hit
    }

    /// Visible exact entry for `prompt`, without the feature guard.
    pub fn entry(&self, prompt: &str) -> Option<CacheEntry> {
        self.exact.get(&normalize_prompt(prompt))
    }

    /// Write a validated network response to every tier.
    pub fn record(&self, prompt: &str, features: &FeatureSet, content: &str) {
        self.exact
            .insert(normalize_prompt(prompt), content, features);
        self.similarity.push(features.bucket_key(), prompt);
        if let Some(key) = features.prediction_key() {
            debug!(key = %key, "prediction updated");
            self.predictions.insert(key, content);
        }
    }

    /// Empty all three tiers.
    pub fn clear(&self) {
        self.exact.clear();
        self.similarity.clear();
        self.predictions.clear();
        info!("response cache cleared");
    }

    /// Snapshot of tier sizes. `queue_length` is left at zero; the broker
    /// fills it in.
    pub fn stats(&self) -> CacheStats {
        let (exact_count, oldest_entry_age) = self.exact.summary();
        CacheStats {
            exact_count,
            similarity_count: self.similarity.len(),
            prediction_count: self.predictions.len(),
            queue_length: 0,
            oldest_entry_age,
        }
    }
}

fn record_lookup(tier: &'static str, hit: bool) {
    if hit {
        debug!(tier, "cache hit");
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
    } else {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => tier).increment(1);
    }
}
