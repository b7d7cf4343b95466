//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_rejected_total` (counter): pre-commit failures by reason
//! - `relay_sessions_total` (counter): finished sessions by outcome
//! - `relay_active_sessions` (gauge): sessions with an open upstream
//! - `relay_bytes_forwarded_total` (counter): bytes written downstream
//! - `relay_session_duration_seconds` (histogram): session lifetime
//!
//! Without an installed recorder every call is a no-op, so tests and
//! deployments with metrics disabled pay nothing.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rejected(reason: &'static str) {
    counter!("relay_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn record_session_opened() {
    gauge!("relay_active_sessions").increment(1.0);
}

pub fn record_session_released() {
    gauge!("relay_active_sessions").decrement(1.0);
}

pub fn record_bytes_forwarded(bytes: usize) {
    counter!("relay_bytes_forwarded_total").increment(bytes as u64);
}

pub fn record_session_finished(outcome: &'static str, started: Instant) {
    counter!("relay_sessions_total", "outcome" => outcome).increment(1);
    histogram!("relay_session_duration_seconds").record(started.elapsed().as_secs_f64());
}
