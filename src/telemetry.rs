//! Telemetry metric name constants.
//!
//! Centralised metric names for broker operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `kibitz_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `source`: where a completion came from: "prediction", "similarity",
//!   "exact" or "network"
//! - `tier`: cache tier consulted: "prediction", "similarity" or "exact"
//! - `status`: outcome: "ok" or "error"
//! - `endpoint`: rate-limited endpoint name

/// Total requests resolved by the broker.
///
/// Labels: `source`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "kibitz_requests_total";

/// Time from dispatch to resolution, in seconds.
///
/// Labels: `source`.
pub const REQUEST_DURATION_SECONDS: &str = "kibitz_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `endpoint`.
pub const RETRIES_TOTAL: &str = "kibitz_retries_total";

/// Total cache hits.
///
/// Labels: `tier`.
pub const CACHE_HITS_TOTAL: &str = "kibitz_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier`.
pub const CACHE_MISSES_TOTAL: &str = "kibitz_cache_misses_total";

/// Times a dispatch had to wait for a rate-limit window to reset.
///
/// Labels: `endpoint`.
pub const RATE_LIMIT_WAITS_TOTAL: &str = "kibitz_rate_limit_waits_total";

/// Number of requests taken per scheduling cycle.
pub const BATCH_SIZE: &str = "kibitz_batch_size";

/// Requests waiting in the queue.
pub const QUEUE_DEPTH: &str = "kibitz_queue_depth";
