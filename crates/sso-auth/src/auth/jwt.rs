//! Token Validator for IdP-issued bearer tokens.
//!
//! Validates incoming JWTs using public keys served by the [`JwksCache`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; the header's `alg` is checked before any key
//!   lookup so a forged header cannot trigger a JWKS refresh
//! - Temporal claims are checked against the injected clock, expiry first
//! - Issuer must match exactly; audience follows the portal's audience rule

use crate::auth::claims::{Audience, RawClaims, TokenClaims};
use crate::auth::clock::Clock;
use crate::auth::jwks::{FetchError, JwksCache, KeyLookupError};
use crate::observability::metrics;
use common::jwt::{extract_alg, extract_kid, validate_iat_at, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Validation};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// The only accepted signature algorithm.
const ACCEPTED_ALGORITHM: &str = "RS256";

/// Reasons a bearer token is rejected.
///
/// Messages are for server-side logs; the gate maps each kind to a generic
/// client-facing error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token signing key is unknown")]
    UnknownKey,

    #[error("Signing keys unavailable: {0}")]
    KeysUnavailable(FetchError),

    #[error("Token algorithm is not supported")]
    UnsupportedAlgorithm,

    #[error("Token signature is invalid")]
    BadSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Token is missing required claim '{0}'")]
    MissingClaim(&'static str),

    #[error("Token issuer does not match")]
    IssuerMismatch,

    #[error("Token has no audience")]
    MissingAudience,

    #[error("Token audience is not accepted")]
    AudienceRejected,

    #[error("Token has no subject or user ID")]
    MissingSubject,

    #[error("Token has no email claim")]
    MissingEmail,
}

impl ValidationError {
    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ValidationError::Malformed => "malformed",
            ValidationError::UnknownKey => "unknown_key",
            ValidationError::KeysUnavailable(_) => "keys_unavailable",
            ValidationError::UnsupportedAlgorithm => "unsupported_algorithm",
            ValidationError::BadSignature => "bad_signature",
            ValidationError::Expired => "expired",
            ValidationError::NotYetValid => "not_yet_valid",
            ValidationError::MissingClaim(_) => "missing_claim",
            ValidationError::IssuerMismatch => "issuer_mismatch",
            ValidationError::MissingAudience => "missing_audience",
            ValidationError::AudienceRejected => "audience_rejected",
            ValidationError::MissingSubject => "missing_subject",
            ValidationError::MissingEmail => "missing_email",
        }
    }
}

impl From<JwtValidationError> for ValidationError {
    fn from(_: JwtValidationError) -> Self {
        ValidationError::Malformed
    }
}

/// JWT validator using keys from the JWKS cache.
pub struct TokenValidator {
    /// Cache serving the IdP's signing keys.
    jwks: Arc<JwksCache>,

    /// Clock for temporal claim checks.
    clock: Arc<dyn Clock>,

    /// Exact `iss` value tokens must carry.
    expected_issuer: String,

    /// Audience value accepted inside an `aud` array.
    expected_audience: String,

    /// Tolerance for `iat` in the future.
    clock_skew: Duration,
}

impl TokenValidator {
    /// Create a new token validator.
    ///
    /// # Arguments
    ///
    /// * `jwks` - Key cache for signature verification
    /// * `clock` - Clock for `exp`/`nbf`/`iat` checks
    /// * `expected_issuer` - Issuer tokens must carry
    /// * `expected_audience` - Portal's configured audience
    /// * `clock_skew` - Tolerance for `iat` in the future
    pub fn new(
        jwks: Arc<JwksCache>,
        clock: Arc<dyn Clock>,
        expected_issuer: String,
        expected_audience: String,
        clock_skew: Duration,
    ) -> Self {
        Self {
            jwks,
            clock,
            expected_issuer,
            expected_audience,
            clock_skew,
        }
    }

    /// Validate a JWT and return its normalized claims.
    ///
    /// # Checks, in order
    ///
    /// 1. Size and structure; header must carry a `kid`
    /// 2. Header `alg` must be RS256
    /// 3. Key lookup (one forced refresh on an unknown `kid`)
    /// 4. RS256 signature
    /// 5. `exp`, then `nbf`, then `iat` against the clock
    /// 6. Issuer, then audience
    /// 7. Subject, then email
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first failed check.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, ValidationError> {
        let result = self.validate_inner(token).await;

        match &result {
            Ok(_) => {
                metrics::record_token_validation("success", None);
                tracing::debug!(target: "sso.auth.jwt", "Token validated successfully");
            }
            Err(e) => {
                metrics::record_token_validation("error", Some(e.error_type()));
                tracing::debug!(target: "sso.auth.jwt", error_type = e.error_type(), "Token rejected");
            }
        }

        result
    }

    async fn validate_inner(&self, token: &str) -> Result<TokenClaims, ValidationError> {
        // 1. Extract kid from header (includes size check via common::jwt)
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "sso.auth.jwt", error = ?e, "Token kid extraction failed");
            ValidationError::from(e)
        })?;

        // 2. RS256 only, checked before any network activity
        let alg = extract_alg(token)?;
        if alg != ACCEPTED_ALGORITHM {
            tracing::debug!(target: "sso.auth.jwt", alg = %alg, "Token uses unsupported algorithm");
            return Err(ValidationError::UnsupportedAlgorithm);
        }

        // 3. Key lookup
        let key = self.jwks.get_key(&kid).await.map_err(|e| match e {
            KeyLookupError::NotFound => ValidationError::UnknownKey,
            KeyLookupError::NoKeysAvailable(fetch) => ValidationError::KeysUnavailable(fetch),
        })?;

        // 4. Signature; claim policy is enforced below against our own clock
        let mut validation = Validation::new(key.algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let raw = decode::<RawClaims>(token, key.decoding_key(), &validation)
            .map_err(|e| {
                tracing::debug!(target: "sso.auth.jwt", error = %e, "Token verification failed");
                match e.kind() {
                    ErrorKind::InvalidSignature => ValidationError::BadSignature,
                    ErrorKind::InvalidAlgorithm => ValidationError::UnsupportedAlgorithm,
                    _ => ValidationError::Malformed,
                }
            })?
            .claims;

        // 5. Temporal claims
        let now = self.clock.now().timestamp();
        let (issued_at, expires_at) = self.check_temporal(&raw, now)?;

        // 6. Issuer and audience
        if raw.iss.as_deref() != Some(self.expected_issuer.as_str()) {
            tracing::debug!(target: "sso.auth.jwt", "Token issuer mismatch");
            return Err(ValidationError::IssuerMismatch);
        }
        let audience = self.check_audience(raw.aud.as_ref())?;

        // 7. Identity claims
        let subject = raw.subject();
        let nested_user_id = raw.nested_user_id();
        if subject.is_none() && nested_user_id.is_none() {
            return Err(ValidationError::MissingSubject);
        }
        let email = raw.preferred_email().ok_or(ValidationError::MissingEmail)?;

        Ok(TokenClaims {
            key_id: kid,
            subject,
            nested_user_id,
            email,
            app_email: raw.app_email.filter(|s| !s.is_empty()),
            issuer: self.expected_issuer.clone(),
            audience,
            issued_at,
            expires_at,
            not_before: raw.nbf,
        })
    }

    /// Check `exp`, `nbf` and `iat`; returns `(iat, exp)`.
    fn check_temporal(&self, raw: &RawClaims, now: i64) -> Result<(i64, i64), ValidationError> {
        let expires_at = raw.exp.ok_or(ValidationError::MissingClaim("exp"))?;
        if now > expires_at {
            return Err(ValidationError::Expired);
        }

        if let Some(not_before) = raw.nbf {
            if now < not_before {
                return Err(ValidationError::NotYetValid);
            }
        }

        let issued_at = raw.iat.ok_or(ValidationError::MissingClaim("iat"))?;
        validate_iat_at(issued_at, self.clock_skew, now)
            .map_err(|_| ValidationError::NotYetValid)?;

        Ok((issued_at, expires_at))
    }

    /// Apply the audience rule; returns the audience values on acceptance.
    ///
    /// A single non-empty string is accepted whatever its value; an array
    /// must contain the configured audience.
    fn check_audience(&self, aud: Option<&Audience>) -> Result<Vec<String>, ValidationError> {
        match aud {
            None => Err(ValidationError::MissingAudience),
            Some(Audience::Single(value)) if !value.is_empty() => {
                if value != &self.expected_audience {
                    tracing::debug!(target: "sso.auth.jwt", "Accepting token with non-default audience string");
                }
                Ok(vec![value.clone()])
            }
            Some(Audience::Multiple(values)) if values.contains(&self.expected_audience) => {
                Ok(values.clone())
            }
            Some(_) => Err(ValidationError::AudienceRejected),
        }
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("expected_issuer", &self.expected_issuer)
            .field("expected_audience", &self.expected_audience)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}
