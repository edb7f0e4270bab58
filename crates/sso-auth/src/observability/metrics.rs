//! Metrics definitions for the SSO authentication service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sso_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: success, error (timeout for HTTP)
//! - `phase`: initial, refresh
//! - `error_type`: bounded by error variants
//! - `code`: bounded by gate error codes plus "OK"
//! - `endpoint`: the service's static paths plus "/other"

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP request buckets
        .set_buckets_for_metric(
            Matcher::Prefix("sso_auth_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetch buckets, bounded by the 10s fetch timeout
        .set_buckets_for_metric(
            Matcher::Prefix("sso_auth_jwks_fetch".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `sso_auth_http_requests_total`, `sso_auth_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("sso_auth_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("sso_auth_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path to a bounded label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// JWKS Cache Metrics
// ============================================================================

/// Record one JWKS fetch attempt.
///
/// Metric: `sso_auth_jwks_fetch_total` (labels: `status`, `phase`),
/// `sso_auth_jwks_fetch_duration_seconds` (labels: `phase`),
/// `sso_auth_jwks_fetch_failures_total` (labels: `phase`, `error_type`, on failure only)
///
/// `phase` is "initial" while nothing has ever been cached, "refresh"
/// afterwards, so a first-use outage is distinguishable from a transient
/// refresh failure.
pub fn record_jwks_fetch(
    status: &str,
    phase: &'static str,
    error_type: Option<&'static str>,
    duration: Duration,
) {
    histogram!("sso_auth_jwks_fetch_duration_seconds",
        "phase" => phase
    )
    .record(duration.as_secs_f64());

    counter!("sso_auth_jwks_fetch_total",
        "status" => status.to_string(),
        "phase" => phase
    )
    .increment(1);

    if let Some(err_type) = error_type {
        counter!("sso_auth_jwks_fetch_failures_total",
            "phase" => phase,
            "error_type" => err_type
        )
        .increment(1);
    }
}

/// Record a caller joining an already in-flight JWKS refresh.
///
/// Metric: `sso_auth_jwks_refresh_joined_total`
pub fn record_jwks_refresh_joined() {
    counter!("sso_auth_jwks_refresh_joined_total").increment(1);
}

/// Set the number of keys in the current key set.
///
/// Metric: `sso_auth_jwks_cached_keys`
#[allow(clippy::cast_precision_loss)] // Key counts are tiny
pub fn set_jwks_cached_keys(count: usize) {
    gauge!("sso_auth_jwks_cached_keys").set(count as f64);
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a token validation outcome.
///
/// Metric: `sso_auth_token_validations_total`
/// Labels: `status`, `error_type` ("none" on success)
pub fn record_token_validation(status: &str, error_type: Option<&'static str>) {
    counter!("sso_auth_token_validations_total",
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}

// ============================================================================
// Gate Metrics
// ============================================================================

/// Record an authentication gate decision.
///
/// Metric: `sso_auth_gate_decisions_total`
/// Labels: `code` (gate error code, or "OK" for an authenticated request)
pub fn record_auth_decision(code: &'static str) {
    counter!("sso_auth_gate_decisions_total",
        "code" => code
    )
    .increment(1);
}
