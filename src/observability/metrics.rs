//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): handled connections by outcome
//! - `proxy_request_duration_seconds` (histogram): latency by outcome
//! - `proxy_cache_events_total` (counter): hit, miss, store_error, corrupt
//! - `proxy_origin_requests_total` (counter): origin calls by result (ok, error, rejected)
//! - `proxy_active_connections` (gauge): connections being handled
//!
//! Recording without an installed recorder is a no-op, so library code and
//! tests call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: &'static str, start: Instant) {
    ::metrics::counter!("proxy_requests_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    ::metrics::counter!("proxy_cache_events_total", "event" => event).increment(1);
}

pub fn record_origin_request(result: &'static str) {
    ::metrics::counter!("proxy_origin_requests_total", "result" => result).increment(1);
}

pub fn connection_opened() {
    ::metrics::gauge!("proxy_active_connections").increment(1.0);
}

pub fn connection_closed() {
    ::metrics::gauge!("proxy_active_connections").decrement(1.0);
}
