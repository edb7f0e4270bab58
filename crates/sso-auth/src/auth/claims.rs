//! JWT claims structures.
//!
//! [`RawClaims`] mirrors the IdP payload with every field optional so the
//! validator can report precisely which claim is missing. [`TokenClaims`] is
//! the normalized result handed to the gate. Identifiers and emails are
//! redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Audience claim as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience string.
    Single(String),
    /// An array of audience strings.
    Multiple(Vec<String>),
    /// Any other JSON shape (number, object, mixed array).
    Other(serde_json::Value),
}

/// NumericDate as it appears on the wire; RFC 7519 allows fractional seconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Seconds(i64),
    Fractional(f64),
}

/// Deserialize an optional NumericDate, flooring fractional seconds.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<NumericDate>::deserialize(deserializer)?.map(|date| match date {
            NumericDate::Seconds(secs) => secs,
            // `as` saturates; JSON cannot carry NaN or infinities
            NumericDate::Fractional(secs) => secs.floor() as i64,
        }),
    )
}

/// Identifier that some IdPs emit as a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ClaimId {
    Text(String),
    Number(i64),
}

impl ClaimId {
    fn into_non_empty(self) -> Option<String> {
        match self {
            ClaimId::Text(s) => non_empty(Some(s)),
            ClaimId::Number(n) => Some(n.to_string()),
        }
    }
}

/// Nested `user` object carried by some IdP tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedUser {
    #[serde(default)]
    pub id: Option<ClaimId>,

    #[serde(default)]
    pub email: Option<String>,
}

/// Unverified-shape payload of an IdP token.
///
/// Only deserialized after the signature has been verified.
#[derive(Clone, Default, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<ClaimId>,

    #[serde(default)]
    pub user: Option<NestedUser>,

    #[serde(default)]
    pub app_email: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub aud: Option<Audience>,

    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,

    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,

    #[serde(default, deserialize_with = "numeric_date")]
    pub nbf: Option<i64>,
}

impl fmt::Debug for RawClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user.as_ref().map(|_| "[REDACTED]"))
            .field("app_email", &self.app_email.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .finish()
    }
}

impl RawClaims {
    /// Top-level `sub`, if non-empty.
    pub fn subject(&self) -> Option<String> {
        self.sub.clone().and_then(ClaimId::into_non_empty)
    }

    /// Nested `user.id`, if non-empty.
    pub fn nested_user_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .and_then(|user| user.id.clone())
            .and_then(ClaimId::into_non_empty)
    }

    /// First non-empty email in priority order `app_email`, `email`,
    /// `user.email`.
    pub fn preferred_email(&self) -> Option<String> {
        non_empty(self.app_email.clone())
            .or_else(|| non_empty(self.email.clone()))
            .or_else(|| non_empty(self.user.as_ref().and_then(|user| user.email.clone())))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Verified and normalized claims.
///
/// Constructed only by the token validator; at least one of `subject` or
/// `nested_user_id` is always present and `email` is never empty.
#[derive(Clone, Serialize)]
pub struct TokenClaims {
    /// Key ID the token was verified with.
    pub key_id: String,

    /// Top-level `sub` - redacted in Debug output.
    pub subject: Option<String>,

    /// Nested `user.id` - redacted in Debug output.
    pub nested_user_id: Option<String>,

    /// Winning email (app_email > email > user.email) - redacted in Debug output.
    pub email: String,

    /// Application-scoped email, if the IdP sent one.
    pub app_email: Option<String>,

    pub issuer: String,

    /// Audience values as sent by the IdP.
    pub audience: Vec<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub issued_at: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub expires_at: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
}

impl TokenClaims {
    /// The IdP's identifier for the user: `sub`, falling back to `user.id`.
    pub fn external_subject(&self) -> &str {
        self.subject
            .as_deref()
            .or(self.nested_user_id.as_deref())
            .unwrap_or_default()
    }
}

/// Custom Debug implementation that redacts identifiers and emails.
impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("key_id", &self.key_id)
            .field("subject", &self.subject.as_ref().map(|_| "[REDACTED]"))
            .field(
                "nested_user_id",
                &self.nested_user_id.as_ref().map(|_| "[REDACTED]"),
            )
            .field("email", &"[REDACTED]")
            .field("app_email", &self.app_email.as_ref().map(|_| "[REDACTED]"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("not_before", &self.not_before)
            .finish()
    }
}
