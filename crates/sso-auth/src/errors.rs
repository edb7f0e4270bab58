//! Authentication gate error types.
//!
//! All errors map to a stable code and HTTP status via the `IntoResponse`
//! impl. Messages returned to clients are intentionally generic; the
//! underlying cause is carried for server-side logs only.

use crate::auth::jwt::ValidationError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// `WWW-Authenticate` challenge attached to every 401 response.
pub const WWW_AUTHENTICATE_CHALLENGE: &str = "Bearer realm=\"portal\", error=\"invalid_token\"";

/// Authentication gate error type.
///
/// Maps to HTTP status codes:
/// - MissingAuthHeader, InvalidToken, TokenExpired, AuthFailed: 401 Unauthorized
/// - MissingEmail: 400 Bad Request
/// - UserNotFound: 403 Forbidden
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("Missing or non-Bearer Authorization header")]
    MissingAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing identity claim: {0}")]
    MissingEmail(String),

    #[error("User not found or inactive")]
    UserNotFound,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),
}

impl GateError {
    /// Stable error code for clients and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::MissingAuthHeader => "MISSING_AUTH_HEADER",
            GateError::InvalidToken(_) => "INVALID_TOKEN",
            GateError::TokenExpired => "TOKEN_EXPIRED",
            GateError::MissingEmail(_) => "MISSING_EMAIL",
            GateError::UserNotFound => "USER_NOT_FOUND",
            GateError::AuthFailed(_) => "AUTH_FAILED",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::MissingAuthHeader
            | GateError::InvalidToken(_)
            | GateError::TokenExpired
            | GateError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            GateError::MissingEmail(_) => StatusCode::BAD_REQUEST,
            GateError::UserNotFound => StatusCode::FORBIDDEN,
        }
    }

    /// Generic client-facing message.
    fn client_message(&self) -> &'static str {
        match self {
            GateError::MissingAuthHeader => "A Bearer token is required in the Authorization header",
            GateError::InvalidToken(_) => "The access token is invalid or expired",
            GateError::TokenExpired => "The access token has expired",
            GateError::MissingEmail(_) => "The access token does not identify a user email",
            GateError::UserNotFound => "No active portal account exists for this user",
            GateError::AuthFailed(_) => "Authentication failed, please try again later",
        }
    }
}

impl From<ValidationError> for GateError {
    fn from(err: ValidationError) -> Self {
        match &err {
            ValidationError::Expired => GateError::TokenExpired,
            ValidationError::MissingSubject | ValidationError::MissingEmail => {
                GateError::MissingEmail(err.error_type().to_string())
            }
            ValidationError::KeysUnavailable(fetch) => GateError::AuthFailed(fetch.to_string()),
            ValidationError::Malformed
            | ValidationError::UnknownKey
            | ValidationError::UnsupportedAlgorithm
            | ValidationError::BadSignature
            | ValidationError::NotYetValid
            | ValidationError::MissingClaim(_)
            | ValidationError::IssuerMismatch
            | ValidationError::MissingAudience
            | ValidationError::AudienceRejected => {
                GateError::InvalidToken(err.error_type().to_string())
            }
        }
    }
}

/// JSON error body: `{ error, code, message }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// HTTP reason phrase.
    pub error: &'static str,

    /// Stable error code.
    pub code: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error"),
            code: self.code(),
            message: Some(self.client_message()),
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
            );
        }

        response
    }
}
