//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_decisions_total` (counter): labels `stage`, `outcome`
//! - `admission_tracked_clients` (gauge): clients holding limiter state
//! - `gateway_upstream_requests_total` (counter): labels `status`
//! - `gateway_upstream_duration_seconds` (histogram)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_decision(stage: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "admission_decisions_total",
        "stage" => stage,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_tracked_clients(count: usize) {
    ::metrics::gauge!("admission_tracked_clients").set(count as f64);
}

pub fn record_upstream(status: u16, start: Instant) {
    ::metrics::counter!("gateway_upstream_requests_total", "status" => status.to_string())
        .increment(1);
    ::metrics::histogram!("gateway_upstream_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}
