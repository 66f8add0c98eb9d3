//! Metrics collection and exposition.
//!
//! # Metrics
//! - `httpserve_requests_total` (counter): completed requests by status
//!
//! # Design Decisions
//! - Recorded from a hook, so adopted responses are not counted
//! - Prometheus exporter serves its own scrape endpoint

use std::net::SocketAddr;

use axum::http::StatusCode;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::hooks::{hook, Hook};

pub const REQUESTS_TOTAL: &str = "httpserve_requests_total";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    metrics::describe_counter!(REQUESTS_TOTAL, "Completed requests by status code");
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one completed request.
pub fn record_request(status: StatusCode) {
    metrics::counter!(REQUESTS_TOTAL, "status" => status.as_u16().to_string()).increment(1);
}

/// A hook that counts every completed request by status.
pub fn metrics_hook() -> Hook {
    hook(|status, _| record_request(status))
}
