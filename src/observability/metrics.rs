//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, in-flight, abandoned)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `service_requests_total` (counter): requests by transport, operation, status
//! - `service_request_duration_seconds` (histogram): latency by transport, operation
//! - `service_in_flight_requests` (gauge): requests currently running, by transport
//! - `service_abandoned_requests_total` (counter): requests cut off at shutdown
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   embedders pay nothing
//! - Operation labels use the route pattern, never the raw path, to keep
//!   cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::service::Transport;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
///
/// `status` is the HTTP status for HTTP requests and the RPC code for RPC calls.
pub fn record_request(transport: Transport, operation: &str, status: u16, start: Instant) {
    let transport = transport.as_str();
    counter!(
        "service_requests_total",
        "transport" => transport,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "service_request_duration_seconds",
        "transport" => transport,
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_in_flight(transport: Transport, delta: f64) {
    gauge!("service_in_flight_requests", "transport" => transport.as_str()).increment(delta);
}

pub fn record_abandoned(count: u64) {
    counter!("service_abandoned_requests_total").increment(count);
}
