//! Metrics collection and exposition.
//!
//! # Metrics
//! - `responder_handshake_resolutions_total` (counter): by role, outcome
//! - `responder_requests_total` (counter): by method, status
//! - `responder_request_duration_seconds` (histogram): by method
//! - `responder_listener_exits_total` (counter): by listener, outcome
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::identity::CertRole;

#[derive(Debug, thiserror::Error)]
#[error("failed to start metrics exporter on {addr}: {source}")]
pub struct MetricsError {
    pub addr: SocketAddr,
    #[source]
    pub source: BuildError,
}

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|source| MetricsError { addr, source })?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

pub fn record_handshake_resolution(role: CertRole, ok: bool) {
    counter!(
        "responder_handshake_resolutions_total",
        "role" => role.as_str(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn record_request(method: &str, status: u16, start_time: Instant) {
    counter!(
        "responder_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "responder_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}

pub fn record_listener_exit(listener: &'static str, graceful: bool) {
    counter!(
        "responder_listener_exits_total",
        "listener" => listener,
        "outcome" => if graceful { "graceful" } else { "failed" }
    )
    .increment(1);
}
