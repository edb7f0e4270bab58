//! Authentication middleware for protected routes.
//!
//! Runs the [`AuthGate`] on the `Authorization` header and injects the
//! resulting [`AuthenticatedIdentity`] into request extensions.

use crate::errors::GateError;
use crate::gate::{AuthGate, AuthenticatedIdentity};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Gate resolving bearer tokens to portal identities.
    pub gate: Arc<AuthGate>,
}

/// Authentication middleware.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Returns the gate's classified error (400/401/403) with a JSON body
/// - Continues to next handler with the identity in extensions otherwise
#[instrument(skip(state, req, next), name = "sso.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, GateError> {
    // A header that is not visible ASCII is treated as absent
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if auth_header.is_none() {
        tracing::debug!(target: "sso.middleware.auth", "Missing Authorization header");
    }

    let identity = state.gate.authenticate(auth_header).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extension trait for reading the authenticated identity from a request.
pub trait IdentityExt {
    /// Returns `None` if the auth middleware was not applied to this request.
    fn identity(&self) -> Option<&AuthenticatedIdentity>;
}

impl<B> IdentityExt for axum::extract::Request<B> {
    fn identity(&self) -> Option<&AuthenticatedIdentity> {
        self.extensions().get::<AuthenticatedIdentity>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Full middleware tests need a signed token and a mock JWKS endpoint,
    // which live in the integration tests.

    use super::*;
    use crate::gate::AuthMethod;
    use axum::body::Body;

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_identity_ext() {
        let mut req = axum::extract::Request::new(Body::empty());
        assert!(req.identity().is_none());

        req.extensions_mut().insert(AuthenticatedIdentity {
            external_subject: "sub".to_string(),
            email: "frank@example.com".to_string(),
            local_user_id: "local-1".to_string(),
            role: "member".to_string(),
            department: None,
            position: None,
            employee_code: None,
            auth_method: AuthMethod::Sso,
        });

        assert_eq!(req.identity().unwrap().local_user_id, "local-1");
    }
}
