//! Feature-keyed shortcut store.
//!
//! Maps a [`PredictionKey`] to the last successful response for that
//! situation. Entries never expire and are overwritten on every success;
//! this is a latency heuristic, not a correctness guarantee.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::PredictionKey;

#[derive(Default)]
pub(crate) struct PredictionStore {
    entries: Mutex<HashMap<PredictionKey, String>>,
}

impl PredictionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &PredictionKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub(crate) fn insert(&self, key: PredictionKey, content: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, content.to_string());
    }

    pub(crate) fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
