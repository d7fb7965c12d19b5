//! Prometheus metrics endpoint
//!
//! Exposes application metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

/// Register all custom metrics
fn register_metrics() {
    metrics::describe_counter!(
        "switchboard_requests_total",
        "Total number of gateway requests processed"
    );
    metrics::describe_counter!(
        "switchboard_proxy_requests_total",
        "Total number of pass-through proxy requests"
    );
    metrics::describe_histogram!(
        "switchboard_request_duration_seconds",
        "Request duration in seconds"
    );
}

/// Prometheus metrics endpoint handler
///
/// Returns metrics in Prometheus text format for scraping.
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a dispatched gateway request
pub fn record_request(status: &str, task: &str, provider: &str, duration_secs: f64) {
    metrics::counter!(
        "switchboard_requests_total",
        "status" => status.to_string(),
        "task" => task.to_string(),
        "provider" => provider.to_string()
    )
    .increment(1);
    metrics::histogram!("switchboard_request_duration_seconds", "task" => task.to_string())
        .record(duration_secs);
}

/// Record a pass-through proxy request
pub fn record_proxy_request(status: &str, duration_secs: f64) {
    metrics::counter!(
        "switchboard_proxy_requests_total",
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("switchboard_request_duration_seconds", "task" => "proxy")
        .record(duration_secs);
}
