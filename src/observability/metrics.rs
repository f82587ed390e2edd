//! Metrics collection and exposition.
//!
//! # Metrics
//! - `db_connect_attempts_total` (counter): connect attempts by outcome
//! - `db_unexpected_disconnects_total` (counter): connections lost without
//!   an explicit disconnect
//! - `db_connected` (gauge): 1=connected, 0=not connected
//! - `welcome_visits_total` (counter): page visits by count source
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connect_attempt(outcome: &'static str) {
    metrics::counter!("db_connect_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_unexpected_disconnect() {
    metrics::counter!("db_unexpected_disconnects_total").increment(1);
}

pub fn record_connected(connected: bool) {
    metrics::gauge!("db_connected").set(if connected { 1.0 } else { 0.0 });
}

/// `source` is "database" or "fallback".
pub fn record_visit(source: &'static str) {
    metrics::counter!("welcome_visits_total", "source" => source).increment(1);
}
