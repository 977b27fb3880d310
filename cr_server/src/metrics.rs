//! Prometheus metrics exporter.
//!
//! The library records counters through the `metrics` facade
//! (`games_created_total`, `games_completed_total`, `games_cleaned_total`,
//! `turn_timeouts_total`); installing the exporter here makes them
//! scrapeable at `http://<addr>/metrics`.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))
}
