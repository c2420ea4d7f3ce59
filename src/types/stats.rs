//! Point-in-time introspection snapshots

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Snapshot of the cache tiers and the request queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Unexpired entries in the exact-match tier.
    pub exact_count: usize,
    /// Prompts held across all similarity buckets.
    pub similarity_count: usize,
    /// Entries in the prediction store.
    pub prediction_count: usize,
    /// Requests waiting to be dispatched.
    pub queue_length: usize,
    /// Age of the oldest unexpired exact entry.
    #[serde(rename = "oldest_entry_age_ms", serialize_with = "serialize_opt_millis")]
    pub oldest_entry_age: Option<Duration>,
}

/// Snapshot of a rate-limit window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    /// Calls admitted in the current window (0 once the window has elapsed).
    pub current_count: u32,
    /// Time until the window resets (zero once it has elapsed).
    #[serde(rename = "time_to_reset_ms", serialize_with = "serialize_millis")]
    pub time_to_reset: Duration,
}

impl RateLimitStats {
    pub fn time_to_reset_ms(&self) -> u64 {
        self.time_to_reset.as_millis() as u64
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn serialize_opt_millis<S: Serializer>(
    d: &Option<Duration>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}
