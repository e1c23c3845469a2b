//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_phase_duration_seconds` (histogram): walk duration by phase
//! - `lifecycle_node_stop_seconds` (histogram): wait-phase duration by node
//! - `lifecycle_slow_stop_total` (counter): nodes that exceeded the grace period
//! - `lifecycle_duplicate_stop_total` (counter): stop requests that lost the race
//! - `overlay_sessions_active` (gauge): registered peer sessions
//! - `session_ack_timeouts_total` (counter): missed acknowledgements

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_phase(phase: &'static str, elapsed: Duration) {
    histogram!("lifecycle_phase_duration_seconds", "phase" => phase).record(elapsed.as_secs_f64());
}

pub fn record_node_stopped(node: &str, elapsed: Duration) {
    histogram!("lifecycle_node_stop_seconds", "node" => node.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_slow_stop(node: &str) {
    counter!("lifecycle_slow_stop_total", "node" => node.to_string()).increment(1);
}

pub fn record_duplicate_stop() {
    counter!("lifecycle_duplicate_stop_total").increment(1);
}

pub fn record_active_sessions(count: usize) {
    gauge!("overlay_sessions_active").set(count as f64);
}

pub fn record_ack_timeout() {
    counter!("session_ack_timeouts_total").increment(1);
}
