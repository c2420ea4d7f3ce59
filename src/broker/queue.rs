//! Priority queue of pending submissions.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::Result;
use crate::types::{Completion, SubmitOptions};

/// A submission waiting for dispatch.
///
/// Lives from `submit` until it is selected for a batch; its responder is
/// used exactly once.
pub(crate) struct QueuedRequest {
    pub(crate) prompt: String,
    pub(crate) options: SubmitOptions,
    pub(crate) priority: u32,
    pub(crate) enqueued_at: Instant,
    seq: u64,
    pub(crate) responder: oneshot::Sender<Result<Completion>>,
}

impl QueuedRequest {
    /// Higher priority first, then earlier enqueue time, then submission order.
    fn rank(&self) -> (u32, Reverse<Instant>, Reverse<u64>) {
        (self.priority, Reverse(self.enqueued_at), Reverse(self.seq))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Ordered buffer of pending submissions.
///
/// Selection is deterministic: priority descending, then FIFO. A
/// monotonically increasing sequence number breaks ties between requests
/// enqueued at the same instant.
#[derive(Default)]
pub(crate) struct RequestQueue {
    heap: Mutex<BinaryHeap<QueuedRequest>>,
    next_seq: AtomicU64,
}

impl RequestQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueue a submission and return the new queue length.
    pub(crate) fn push(
        &self,
        prompt: String,
        options: SubmitOptions,
        responder: oneshot::Sender<Result<Completion>>,
    ) -> usize {
        let request = QueuedRequest {
            priority: options.priority,
            prompt,
            options,
            enqueued_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, AtomicOrdering::Relaxed),
            responder,
        };
        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        heap.push(request);
        heap.len()
    }

    /// Remove up to `max` requests, best first.
    pub(crate) fn pop_batch(&self, max: usize) -> Vec<QueuedRequest> {
        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        let n = max.min(heap.len());
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match heap.pop() {
                Some(request) => batch.push(request),
                None => break,
            }
        }
        batch
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
