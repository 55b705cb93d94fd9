//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pairing_requests_total` (counter): start_matching requests
//! - `pairing_matches_total` (counter): pairs formed
//! - `pairing_wait_seconds` (histogram): how long the earlier side waited
//! - `pairing_timeouts_total` (counter): requests expired unmatched
//! - `pairing_cancellations_total` (counter): by reason (disconnect, superseded)
//! - `pairing_waiting_requests` (gauge): requests currently waiting
//! - `pairing_live_connections` (gauge): registered connections
//! - `pairing_notifications_total` (counter): by kind and delivery outcome
//!
//! Without an installed recorder every call is a no-op, so tests need no setup.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_pairing_request() {
    counter!("pairing_requests_total").increment(1);
}

pub fn record_match(waited: Duration) {
    counter!("pairing_matches_total").increment(1);
    histogram!("pairing_wait_seconds").record(waited.as_secs_f64());
}

pub fn record_timeout() {
    counter!("pairing_timeouts_total").increment(1);
}

pub fn record_cancellation(reason: &'static str) {
    counter!("pairing_cancellations_total", "reason" => reason).increment(1);
}

pub fn record_waiting(waiting: usize) {
    gauge!("pairing_waiting_requests").set(waiting as f64);
}

pub fn record_live_connections(live: usize) {
    gauge!("pairing_live_connections").set(live as f64);
}

pub fn record_notification(kind: &'static str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "dropped" };
    counter!("pairing_notifications_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_rejected_connection() {
    counter!("pairing_rejected_connections_total").increment(1);
}
