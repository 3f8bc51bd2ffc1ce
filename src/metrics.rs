//! Prometheus metrics exporter, independent of any web framework.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Installs the process-wide Prometheus recorder and starts its HTTP
/// listener. Call once at process start.
pub fn install(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(port, "metrics exporter listening");
    Ok(())
}

pub fn record_scrape_success(platform: &str) {
    metrics::counter!("scrape_success_total", "platform" => platform.to_string()).increment(1);
}

pub fn record_scrape_failure(platform: &str, error_kind: &str) {
    metrics::counter!(
        "scrape_failure_total",
        "platform" => platform.to_string(),
        "error_kind" => error_kind.to_string()
    )
    .increment(1);
}

pub fn record_dedup_skip(platform: &str) {
    metrics::counter!("scrape_dedup_skip_total", "platform" => platform.to_string()).increment(1);
}

pub fn record_rate_limit_skip(platform: &str) {
    metrics::counter!("scrape_rate_limit_skip_total", "platform" => platform.to_string())
        .increment(1);
}

pub fn record_scrape_duration(platform: &str, ms: f64) {
    metrics::histogram!("scrape_duration_ms", "platform" => platform.to_string()).record(ms);
}

pub fn set_daily_cost(cost_usd: f64) {
    metrics::gauge!("daily_cost_usd").set(cost_usd);
}
