//! Exact-match tier keyed by normalized prompt text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use tokio::time::Instant;

use super::CacheEntry;
use crate::types::FeatureSet;

#[derive(Clone)]
struct StoredEntry {
    entry: CacheEntry,
    generation: u64,
}

/// TTL-bounded store of full responses.
///
/// moka bounds memory and evicts on its own clock; visibility is decided
/// here against [`tokio::time::Instant`] so an entry written at `T` is gone
/// for every lookup at or after `T + ttl`. Clearing bumps a generation
/// counter, which hides older entries immediately while moka invalidates
/// them in the background.
pub(crate) struct ExactCache {
    entries: Cache<String, StoredEntry>,
    ttl: Duration,
    generation: AtomicU64,
}

impl ExactCache {
    pub(crate) fn new(max_entries: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            entries,
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Visible entry for `key`, if any.
    pub(crate) fn get(&self, key: &str) -> Option<CacheEntry> {
        let stored = self.entries.get(key)?;
        self.is_visible(&stored, Instant::now())
            .then_some(stored.entry)
    }

    pub(crate) fn insert(&self, key: String, content: &str, features: &FeatureSet) {
        let stored = StoredEntry {
            entry: CacheEntry {
                normalized_key: key.clone(),
                content: content.to_string(),
                created_at: Instant::now(),
                features: features.clone(),
            },
            generation: self.generation.load(Ordering::Acquire),
        };
        self.entries.insert(key, stored);
    }

    pub(crate) fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate_all();
    }

    /// Number of visible entries and the age of the oldest one.
    pub(crate) fn summary(&self) -> (usize, Option<Duration>) {
        let now = Instant::now();
        let mut count = 0;
        let mut oldest: Option<Instant> = None;
        for (_, stored) in self.entries.iter() {
            if !self.is_visible(&stored, now) {
                continue;
            }
            count += 1;
            let created = stored.entry.created_at;
            if oldest.is_none_or(|o| created < o) {
                oldest = Some(created);
            }
        }
        (count, oldest.map(|o| now.saturating_duration_since(o)))
    }

    fn is_visible(&self, stored: &StoredEntry, now: Instant) -> bool {
        stored.generation == self.generation.load(Ordering::Acquire)
            && stored.entry.created_at + self.ttl > now
    }
}
