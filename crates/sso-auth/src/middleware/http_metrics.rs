//! HTTP metrics middleware.
//!
//! Records every response, including the gate's 400/401/403 rejections and
//! framework-level 404/405 responses produced before any handler runs.

use crate::observability::metrics::record_http_request;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Record method, endpoint, status and latency of each request.
///
/// The endpoint label prefers the matched route template; unmatched paths
/// are collapsed by [`record_http_request`]. Must be the outermost layer so
/// that timeouts and rejections are counted too.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_owned(), |p| p.as_str().to_owned());

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &endpoint,
        response.status().as_u16(),
        started.elapsed(),
    );

    response
}
