//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_forward_attempts_total` (counter): attempts by strategy, outcome
//! - `gateway_fallback_exhausted_total` (counter): plans with no response
//! - `gateway_service_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until a recorder is installed, so handlers call
//! these unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::forward::Strategy;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    ::tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a completed client request.
pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("route", route.to_string()),
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
    ];
    counter!("gateway_requests_total", labels.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

/// Record one forward attempt. `outcome` is `response` or a transport error kind.
pub fn record_forward_attempt(strategy: Strategy, outcome: &'static str) {
    counter!(
        "gateway_forward_attempts_total",
        "strategy" => strategy.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_fallback_exhausted(route: &str) {
    counter!("gateway_fallback_exhausted_total", "route" => route.to_string()).increment(1);
}

pub fn record_service_health(service: &str, healthy: bool) {
    gauge!("gateway_service_health", "service" => service.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
