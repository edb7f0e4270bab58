//! Authentication gate.
//!
//! Turns an `Authorization` header into an [`AuthenticatedIdentity`] or a
//! classified [`GateError`]. The gate is stateless per call; the only side
//! effects are the key cache's fetch-on-miss and emitted logs/metrics.

use crate::auth::claims::TokenClaims;
use crate::auth::jwt::{TokenValidator, ValidationError};
use crate::directory::{UserDirectory, UserRecord};
use crate::errors::GateError;
use crate::observability::metrics;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Required scheme prefix, including the separating space.
const BEARER_PREFIX: &str = "Bearer ";

/// How the identity was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthMethod {
    #[serde(rename = "SSO")]
    Sso,
}

/// Identity of an authenticated request.
///
/// Verified token claims merged with the local directory record. Lives for
/// the duration of one request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    /// The IdP's identifier for the user - redacted in Debug output.
    pub external_subject: String,

    /// Verified email - redacted in Debug output.
    pub email: String,

    pub local_user_id: String,

    pub role: String,

    pub department: Option<String>,

    pub position: Option<String>,

    /// Redacted in Debug output.
    pub employee_code: Option<String>,

    pub auth_method: AuthMethod,
}

impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("external_subject", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("local_user_id", &self.local_user_id)
            .field("role", &self.role)
            .field("department", &self.department)
            .field("position", &self.position)
            .field(
                "employee_code",
                &self.employee_code.as_ref().map(|_| "[REDACTED]"),
            )
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Authentication gate: bearer header in, identity or classified error out.
pub struct AuthGate {
    validator: Arc<TokenValidator>,
    directory: Arc<dyn UserDirectory>,
}

impl AuthGate {
    /// Create a new gate.
    pub fn new(validator: Arc<TokenValidator>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            validator,
            directory,
        }
    }

    /// Authenticate a request from its `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `MissingAuthHeader` - header absent or not `Bearer `
    /// - `InvalidToken` / `TokenExpired` / `MissingEmail` / `AuthFailed` -
    ///   mapped from the token validator
    /// - `UserNotFound` - no active directory account for the token's email
    /// - `AuthFailed` - directory backend failure
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedIdentity, GateError> {
        let result = self.authenticate_inner(authorization).await;

        match &result {
            Ok(_) => metrics::record_auth_decision("OK"),
            Err(e) => {
                metrics::record_auth_decision(e.code());
                tracing::debug!(target: "sso.gate", code = e.code(), reason = %e, "Request rejected");
            }
        }

        result
    }

    async fn authenticate_inner(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedIdentity, GateError> {
        let token = extract_bearer_token(authorization)?;
        if token.is_empty() {
            return Err(GateError::InvalidToken("empty bearer token".to_string()));
        }

        let claims = self.validator.validate(token).await.map_err(|e| {
            if matches!(e, ValidationError::KeysUnavailable(_)) {
                tracing::warn!(target: "sso.gate", error = %e, "Cannot verify token, no signing keys available");
            }
            GateError::from(e)
        })?;

        let record = self
            .directory
            .lookup_active_user_by_email(&claims.email)
            .await
            .map_err(|e| {
                tracing::error!(target: "sso.gate", error = %e, "User directory lookup failed");
                GateError::AuthFailed("user directory unavailable".to_string())
            })?
            .ok_or(GateError::UserNotFound)?;

        tracing::debug!(target: "sso.gate", local_user_id = %record.user_id, "Request authenticated");

        Ok(merge_identity(&claims, record))
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

/// Extract the token after the literal `Bearer ` prefix.
fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, GateError> {
    authorization
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(GateError::MissingAuthHeader)
}

fn merge_identity(claims: &TokenClaims, record: UserRecord) -> AuthenticatedIdentity {
    AuthenticatedIdentity {
        external_subject: claims.external_subject().to_string(),
        email: claims.email.clone(),
        local_user_id: record.user_id,
        role: record.role,
        department: record.department,
        position: record.position,
        employee_code: record.employee_code,
        auth_method: AuthMethod::Sso,
    }
}
