//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status
//! - `proxy_request_duration_seconds` (histogram): latency by route
//! - `proxy_admission_rejected_total` (counter): rejections by route, reason
//! - `proxy_backend_selected_total` (counter): picks by route, backend
//! - `proxy_backend_inflight` (gauge): in-flight requests by route, backend
//!
//! Every helper is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request refused by an admission stage.
pub fn record_rejected(route: &str, reason: &'static str) {
    counter!(
        "proxy_admission_rejected_total",
        "route" => route.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a balancer pick.
pub fn record_backend_selected(route: &str, backend: &str) {
    counter!(
        "proxy_backend_selected_total",
        "route" => route.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Tracks one request on the `proxy_backend_inflight` gauge until dropped.
#[derive(Debug)]
pub struct InflightGauge {
    route: String,
    backend: String,
}

impl InflightGauge {
    pub fn new(route: &str, backend: &str) -> Self {
        let gauge = Self {
            route: route.to_string(),
            backend: backend.to_string(),
        };
        gauge.adjust(1.0);
        gauge
    }

    fn adjust(&self, delta: f64) {
        gauge!(
            "proxy_backend_inflight",
            "route" => self.route.clone(),
            "backend" => self.backend.clone()
        )
        .increment(delta);
    }
}

impl Drop for InflightGauge {
    fn drop(&mut self) {
        self.adjust(-1.0);
    }
}
