//! JWT utilities shared across portal services.
//!
//! This module provides the pre-verification helpers every bearer-token
//! consumer needs before it touches a signing key:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Key ID and algorithm extraction from JWT headers
//! - iat validation logic against an explicit clock reading
//! - Base64url decoding of JWK RSA components
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - `extract_kid` does NOT verify anything; it only selects a key
//! - Error messages are generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_kid, validate_iat_at, DEFAULT_CLOCK_SKEW};
//!
//! // Extract key ID for JWKS lookup (includes the size check)
//! let kid = extract_kid(token)?;
//!
//! // After signature verification, validate iat
//! validate_iat_at(claims.iat, DEFAULT_CLOCK_SKEW, now)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any base64 decoding or
/// cryptographic operations.
///
/// # Rationale
///
/// - Typical IdP access tokens are 800-1500 bytes (RS256 signature is 342 chars)
/// - 8KB leaves room for large group/role claims while bounding allocation
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration validation.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during pre-verification JWT checks.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Used to select the verification key from a JWKS that may hold several
/// keys during rotation.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The token MUST still be verified after fetching the key
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, or invalid header JSON
/// - `MissingKid` - Header missing `kid`, or `kid` is not a non-empty string
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    let header = decode_header_json(token)?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}

/// Extract the `alg` header value without verifying the signature.
///
/// Read as a plain string so that values a JWT library refuses to parse
/// (such as `none`) can still be reported as an unsupported algorithm.
///
/// # Errors
///
/// Returns `TokenTooLarge` or `MalformedToken` under the same rules as
/// [`extract_kid`]; a missing or non-string `alg` is `MalformedToken`.
pub fn extract_alg(token: &str) -> Result<String, JwtValidationError> {
    let header = decode_header_json(token)?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MalformedToken)
}

/// Size-check the token and decode its header segment as JSON.
fn decode_header_json(token: &str) -> Result<serde_json::Value, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })
}

/// Validate the `iat` (issued-at) claim against an explicit `now` timestamp.
///
/// Rejects tokens issued more than `clock_skew` in the future. Callers pass
/// `now` from their own clock so tests can pin time.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat > now + clock_skew`.
pub fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by config validation
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode a JWK RSA component (`n` or `e`) from base64url.
///
/// RFC 7518 mandates unpadded base64url, but some IdPs emit trailing `=`
/// padding; it is stripped before decoding. Empty values are rejected.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid base64url or
/// decodes to zero bytes.
pub fn decode_rsa_component(value_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = value_b64url.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(trimmed)?;
    if bytes.is_empty() {
        return Err(base64::DecodeError::InvalidLength(0));
    }
    Ok(bytes)
}

// =============================================================================
// Tests
// =============================================================================
