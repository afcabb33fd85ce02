//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, endpoint
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): denials by tier
//! - `gateway_rate_limit_fail_open_total` (counter): store failures let through
//! - `gateway_auth_failures_total` (counter): rejections by reason
//! - `gateway_public_endpoints` (gauge): size of the exempt endpoint set
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   metrics-disabled deployments pay nothing

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, endpoint: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("endpoint", endpoint.to_string()),
    ];
    counter!("gateway_requests_total", &labels[..]).increment(1);
    histogram!("gateway_request_duration_seconds", &labels[..]).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(tier: &'static str) {
    counter!("gateway_rate_limited_total", "tier" => tier).increment(1);
}

pub fn record_rate_limit_fail_open() {
    counter!("gateway_rate_limit_fail_open_total").increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("gateway_auth_failures_total", "reason" => reason).increment(1);
}

pub fn set_public_endpoints(count: usize) {
    gauge!("gateway_public_endpoints").set(count as f64);
}
