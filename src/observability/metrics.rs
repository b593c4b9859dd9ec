//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): 429s by route
//! - `gateway_circuit_open_total` (counter): fast-fails by route
//! - `gateway_retries_total` (counter): retry attempts by route
//!
//! # Design Decisions
//! - Prometheus exposition on its own listener, separate from traffic
//! - Low-overhead updates; labels limited to bounded sets

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited(route: &str) {
    counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

/// Record a request fast-failed by an open circuit.
pub fn record_circuit_open(route: &str) {
    counter!("gateway_circuit_open_total", "route" => route.to_string()).increment(1);
}

/// Record one retry attempt.
pub fn record_retry(route: &str) {
    counter!("gateway_retries_total", "route" => route.to_string()).increment(1);
}
