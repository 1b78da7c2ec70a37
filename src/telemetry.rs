//! Telemetry metric name constants.
//!
//! Centralised metric names for chemsnap operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `chemsnap_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider name (e.g. "openai", "bedrock")
//! - `operation` — operation invoked (e.g. "classify", "extract_label")
//! - `status` — outcome: "ok" or "error"

/// Total model requests dispatched.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "chemsnap_requests_total";

/// Request duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "chemsnap_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "chemsnap_retries_total";

/// Total prediction cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "chemsnap_cache_hits_total";

/// Total prediction cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "chemsnap_cache_misses_total";
