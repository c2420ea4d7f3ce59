//! Near-duplicate index: prompts grouped by `(street, position)`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::types::BucketKey;

/// Token-set Jaccard similarity of two prompts.
///
/// Tokens are the whitespace-separated words of the lower-cased text.
/// Returns 0.0 when both texts are empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64
}

/// Buckets of previously answered raw prompts.
///
/// Never authoritative: a candidate found here is only served if its
/// exact-tier entry is still visible.
pub(crate) struct SimilarityIndex {
    buckets: Mutex<HashMap<BucketKey, VecDeque<String>>>,
    max_bucket_len: usize,
}

impl SimilarityIndex {
    pub(crate) fn new(max_bucket_len: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_bucket_len: max_bucket_len.max(1),
        }
    }

    /// Candidates in `key`'s bucket scoring strictly above `threshold`,
    /// best first.
    pub(crate) fn candidates(&self, key: &BucketKey, prompt: &str, threshold: f64) -> Vec<String> {
        // Copy the bucket out so scoring happens without the lock held.
        let bucket: Vec<String> = {
            let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
            match buckets.get(key) {
                Some(b) => b.iter().cloned().collect(),
                None => return Vec::new(),
            }
        };
        let mut scored: Vec<(f64, String)> = bucket
            .into_iter()
            .map(|c| (jaccard_similarity(prompt, &c), c))
            .filter(|(score, _)| *score > threshold)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, c)| c).collect()
    }

    /// Record `prompt` as the most recent member of its bucket.
    pub(crate) fn push(&self, key: BucketKey, prompt: &str) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(key).or_default();
        bucket.retain(|p| p != prompt);
        bucket.push_back(prompt.to_string());
        while bucket.len() > self.max_bucket_len {
            bucket.pop_front();
        }
    }

    pub(crate) fn clear(&self) {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Prompts held across all buckets.
    pub(crate) fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(VecDeque::len)
            .sum()
    }
}
