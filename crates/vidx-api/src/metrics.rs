//! Prometheus metrics for the API server and the fetch loop.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vidx_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vidx_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vidx_http_requests_in_flight";

    // Fetch loop metrics
    pub const FETCH_CYCLES_TOTAL: &str = "vidx_fetch_cycles_total";
    pub const FETCH_CYCLE_DURATION_SECONDS: &str = "vidx_fetch_cycle_duration_seconds";
    pub const VIDEOS_INDEXED_TOTAL: &str = "vidx_videos_indexed_total";
    pub const VIDEOS_DROPPED_TOTAL: &str = "vidx_videos_dropped_total";
    pub const INDEX_FAILURES_TOTAL: &str = "vidx_index_failures_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vidx_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished fetch cycle.
pub fn record_fetch_cycle(outcome: &str, indexed: usize, dropped: usize, failed: usize, duration_secs: f64) {
    counter!(names::FETCH_CYCLES_TOTAL, "outcome" => outcome.to_string()).increment(1);
    counter!(names::VIDEOS_INDEXED_TOTAL).increment(indexed as u64);
    counter!(names::VIDEOS_DROPPED_TOTAL).increment(dropped as u64);
    counter!(names::INDEX_FAILURES_TOTAL).increment(failed as u64);
    histogram!(names::FETCH_CYCLE_DURATION_SECONDS).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Route template for labels; unmatched paths collapse to one value.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
