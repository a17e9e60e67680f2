//! YouTube client metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total upstream requests by outcome.
    pub const REQUESTS_TOTAL: &str = "youtube_requests_total";

    /// Request latency in seconds.
    pub const LATENCY_SECONDS: &str = "youtube_latency_seconds";

    /// Items dropped by per-item validation, by reason.
    pub const ITEMS_REJECTED_TOTAL: &str = "youtube_items_rejected_total";
}

/// Record a completed `search.list` call.
pub fn record_request(outcome: &str, latency_ms: f64) {
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(names::LATENCY_SECONDS).record(latency_ms / 1000.0);
}

/// Record an upstream item that failed validation.
pub fn record_item_rejected(reason: &str) {
    counter!(names::ITEMS_REJECTED_TOTAL, "reason" => reason.to_string()).increment(1);
}
