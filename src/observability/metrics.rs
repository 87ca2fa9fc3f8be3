//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bff_requests_total` (counter): proxied requests by method, status
//! - `bff_request_duration_seconds` (histogram): proxy latency by method
//! - `bff_rate_limited_total` (counter): requests rejected with 429
//! - `bff_denied_total` (counter): requests rejected by policy, by reason
//! - `bff_upstream_errors_total` (counter): unmirrored failures, by kind
//! - `bff_rate_limit_keys` (gauge): client keys held by the limiter
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "bff_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("bff_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("bff_rate_limited_total").increment(1);
}

pub fn record_denied(reason: &'static str) {
    counter!("bff_denied_total", "reason" => reason).increment(1);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("bff_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn set_rate_limit_keys(count: usize) {
    gauge!("bff_rate_limit_keys").set(count as f64);
}
