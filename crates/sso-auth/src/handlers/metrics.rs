//! Prometheus scrape endpoint.
//!
//! Unauthenticated so Prometheus can scrape it. Labels are bounded and
//! carry no subjects, emails or tokens.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use metrics_exporter_prometheus::PrometheusHandle;

/// Prometheus text exposition format.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Handler for GET /metrics
#[tracing::instrument(skip_all, name = "sso.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], handle.render())
}
