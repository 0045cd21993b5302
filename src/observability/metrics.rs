//! Metrics collection and exposition.
//!
//! # Metrics
//! - `exchange_responses_total` (counter): responses written, by status and transport
//! - `exchange_bytes_sent_total` (counter): bytes written, by transport
//! - `exchange_transport_errors_total` (counter): discarded I/O errors, by operation
//! - `exchange_timeouts_total` (counter): exchanges cut off by the deadline
//! - `exchange_active_connections` (gauge): open socket connections

use std::net::SocketAddr;

use http::StatusCode;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const TRANSPORT_SOCKET: &str = "socket";
pub const TRANSPORT_MEMORY: &str = "memory";

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_response(status: StatusCode, transport: &'static str) {
    counter!(
        "exchange_responses_total",
        "status" => status.as_u16().to_string(),
        "transport" => transport
    )
    .increment(1);
}

pub fn record_bytes_sent(transport: &'static str, len: usize) {
    counter!("exchange_bytes_sent_total", "transport" => transport).increment(len as u64);
}

pub fn record_transport_error(op: &'static str) {
    counter!("exchange_transport_errors_total", "op" => op).increment(1);
}

pub fn record_timeout() {
    counter!("exchange_timeouts_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("exchange_active_connections").set(count as f64);
}
