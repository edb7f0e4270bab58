//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - 200 once the JWKS cache holds signing keys

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness probe body.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Number of cached signing keys.
    pub jwks_keys: usize,
}

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 503 until the key cache has been populated at least once, so no
/// traffic is routed to an instance that would answer every request with
/// `AUTH_FAILED`. A stale but populated cache is still ready.
#[tracing::instrument(skip_all, name = "sso.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let jwks_keys = state.jwks.key_count().await;

    if jwks_keys == 0 {
        tracing::warn!(target: "sso.health", "Readiness check failed: no signing keys cached");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                jwks_keys,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            jwks_keys,
        }),
    )
}
