//! Builder patterns for test data construction
//!
//! Provides a fluent API for IdP token claims. Timestamps are relative to an
//! explicit base time so tests can pair tokens with a [`crate::ManualClock`].

use crate::{TEST_AUDIENCE, TEST_ISSUER};
use serde_json::{json, Map, Value};

/// Builder for IdP token claims
///
/// Defaults: issuer [`TEST_ISSUER`], audience [`TEST_AUDIENCE`], a subject,
/// an `email`, `iat` at the base time and `exp` one hour later.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::at(NOW)
///     .for_email("alice@example.com")
///     .expires_in(600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    base: i64,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a builder whose relative timestamps are based on `now`.
    pub fn at(now: i64) -> Self {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("sub".to_string(), json!("idp-subject-1"));
        claims.insert("email".to_string(), json!("alice@example.com"));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));

        Self { base: now, claims }
    }

    /// Create a builder based on the current system time.
    pub fn new() -> Self {
        Self::at(chrono::Utc::now().timestamp())
    }

    /// Set the subject
    pub fn for_subject(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the generic `email` claim
    pub fn for_email(self, email: &str) -> Self {
        self.with_claim("email", json!(email))
    }

    /// Set the issuer
    pub fn issued_by(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set the audience to any JSON value (string, array, ...)
    pub fn with_audience(self, audience: Value) -> Self {
        self.with_claim("aud", audience)
    }

    /// Set expiration in seconds from the base time (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = self.base + seconds;
        self.with_claim("exp", json!(exp))
    }

    /// Set issued-at in seconds from the base time
    pub fn issued_in(self, seconds: i64) -> Self {
        let iat = self.base + seconds;
        self.with_claim("iat", json!(iat))
    }

    /// Set not-before in seconds from the base time
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = self.base + seconds;
        self.with_claim("nbf", json!(nbf))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
