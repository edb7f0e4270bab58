//! Current user handler.
//!
//! Returns the identity resolved by the authentication middleware.

use crate::errors::GateError;
use crate::gate::AuthenticatedIdentity;
use crate::middleware::IdentityExt;
use axum::extract::Request;
use axum::Json;
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Requires the auth middleware. A request that reaches this handler
/// without an identity is answered as unauthenticated.
///
/// ## Response
///
/// ```json
/// {
///   "external_subject": "idp-user-9",
///   "email": "erin@example.com",
///   "local_user_id": "local-42",
///   "role": "manager",
///   "department": "Operations",
///   "position": "Lead",
///   "employee_code": "E-0042",
///   "auth_method": "SSO"
/// }
/// ```
#[instrument(skip_all, name = "sso.handlers.me")]
pub async fn get_me(req: Request) -> Result<Json<AuthenticatedIdentity>, GateError> {
    let Some(identity) = req.identity() else {
        tracing::error!(target: "sso.handlers.me", "No identity on request; auth middleware not applied");
        return Err(GateError::MissingAuthHeader);
    };

    tracing::debug!(target: "sso.handlers.me", "Returning authenticated identity");
    Ok(Json(identity.clone()))
}
