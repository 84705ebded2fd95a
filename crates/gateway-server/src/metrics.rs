//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// Client requests total (counter, labels: schema, vendor).
pub const CLIENT_REQUESTS_TOTAL: &str = "client_requests_total";
/// Client request duration seconds (histogram, labels: schema, vendor).
pub const CLIENT_REQUEST_DURATION_SECONDS: &str = "client_request_duration_seconds";
/// Client errors total (counter, labels: schema, category).
pub const CLIENT_ERRORS_TOTAL: &str = "client_errors_total";
/// In-flight streaming responses (gauge).
pub const STREAMS_ACTIVE: &str = "streams_active";
/// Credential selector attempts total (counter, labels: vendor, outcome).
pub const SELECTOR_ATTEMPTS_TOTAL: &str = "selector_attempts_total";
/// Credentials currently excluded by the selector (gauge, labels: vendor).
pub const SELECTOR_EXCLUDED_CREDENTIALS: &str = "selector_excluded_credentials";
/// Quota refresher sweeps completed total (counter).
pub const QUOTA_REFRESHER_SWEEPS_TOTAL: &str = "quota_refresher_sweeps_total";
/// Quota refresher errors total (counter, labels: vendor).
pub const QUOTA_REFRESHER_ERRORS_TOTAL: &str = "quota_refresher_errors_total";
/// Credentials below the low-quota threshold (gauge, labels: vendor).
pub const CREDENTIALS_LOW_QUOTA: &str = "credentials_low_quota";
/// Provider requests total (counter, labels: provider).
pub const PROVIDER_REQUESTS_TOTAL: &str = "provider_requests_total";
/// Provider errors total (counter, labels: provider, status).
pub const PROVIDER_ERRORS_TOTAL: &str = "provider_errors_total";
/// Provider retries total (counter, labels: category).
pub const PROVIDER_RETRIES_TOTAL: &str = "provider_retries_total";
/// Provider request duration seconds (histogram, labels: provider).
pub const PROVIDER_REQUEST_DURATION_SECONDS: &str = "provider_request_duration_seconds";
/// Provider time-to-first-token seconds (histogram, labels: provider).
pub const PROVIDER_TTFT_SECONDS: &str = "provider_ttft_seconds";
/// Provider degraded state (gauge, labels: provider). 1 = degraded, 0 = healthy.
pub const PROVIDER_DEGRADED: &str = "provider_degraded";
