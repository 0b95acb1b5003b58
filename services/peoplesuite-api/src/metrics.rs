//! Prometheus metrics exposition
//!
//! - `api_requests_total` (counter): labels `status`, `method`
//! - `api_request_duration_seconds` (histogram): label `status`
//! - `api_tokens_issued_total` (counter)
//! - `api_auth_failures_total` (counter): label `reason`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("api_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `api_request_duration_seconds` gets explicit buckets so it renders as a
/// histogram (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("api_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!("api_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

pub fn record_token_issued() {
    metrics::counter!("api_tokens_issued_total").increment(1);
}

/// Record a rejected bearer check (`missing`, `invalid` or `store_error`).
pub fn record_auth_failure(reason: &'static str) {
    metrics::counter!("api_auth_failures_total", "reason" => reason).increment(1);
}

/// Middleware counting every request for `/health` and Prometheus.
pub async fn track_requests(
    State(requests_total): State<Arc<AtomicU64>>,
    request: Request,
    next: Next,
) -> Response {
    requests_total.fetch_add(1, Ordering::Relaxed);
    let method = request.method().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    record_request(
        response.status().as_u16(),
        &method,
        started.elapsed().as_secs_f64(),
    );
    response
}
