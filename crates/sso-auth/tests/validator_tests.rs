//! Token validator integration tests.
//!
//! Tokens are real RS256 JWTs signed with fixed test keys; the JWKS
//! transport is mocked and the clock is frozen at [`NOW`].

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use sso_auth::auth::{FetchError, JwksCache, TokenValidator, ValidationError};
use sso_test_utils::{
    jwks_json, sign_hs256, ManualClock, MockJwksFetcher, TestRsaKey, TestTokenBuilder,
    NOW, TEST_AUDIENCE, TEST_ISSUER,
};
use std::sync::Arc;
use std::time::Duration;

const KID: &str = "idp-key-01";

struct Harness {
    key: TestRsaKey,
    fetcher: Arc<MockJwksFetcher>,
    validator: TokenValidator,
}

impl Harness {
    fn new() -> Self {
        let key = TestRsaKey::primary(KID);
        let fetcher = Arc::new(MockJwksFetcher::serving(jwks_json(&[&key])));
        Self::with_fetcher(key, fetcher)
    }

    fn with_fetcher(key: TestRsaKey, fetcher: Arc<MockJwksFetcher>) -> Self {
        let clock = Arc::new(ManualClock::at_timestamp(NOW));
        let jwks = Arc::new(JwksCache::new(fetcher.clone(), clock.clone()));
        let validator = TokenValidator::new(
            jwks,
            clock,
            TEST_ISSUER.to_string(),
            TEST_AUDIENCE.to_string(),
            Duration::from_secs(300),
        );

        Self {
            key,
            fetcher,
            validator,
        }
    }

    async fn validate(&self, claims: Value) -> Result<sso_auth::auth::TokenClaims, ValidationError> {
        self.validator.validate(&self.key.sign(&claims)).await
    }
}

/// Build an unsigned token with an arbitrary header.
fn unsigned_token(header: Value, claims: &Value) -> String {
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

#[tokio::test]
async fn test_valid_token_round_trip() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW)
        .for_subject("idp-user-1")
        .for_email("alice@example.com")
        .build();

    let result = harness.validate(claims).await.unwrap();

    assert_eq!(result.key_id, KID);
    assert_eq!(result.subject.as_deref(), Some("idp-user-1"));
    assert_eq!(result.email, "alice@example.com");
    assert_eq!(result.issuer, TEST_ISSUER);
    assert_eq!(result.audience, vec![TEST_AUDIENCE.to_string()]);
    assert_eq!(result.issued_at, NOW);
    assert_eq!(result.expires_at, NOW + 3600);
    assert_eq!(harness.fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_second_validation_uses_cached_key() {
    let harness = Harness::new();

    harness.validate(TestTokenBuilder::at(NOW).build()).await.unwrap();
    harness.validate(TestTokenBuilder::at(NOW).build()).await.unwrap();

    assert_eq!(harness.fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).issued_in(-7200).expires_in(-1).build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::Expired
    );
}

#[tokio::test]
async fn test_token_valid_at_exact_expiry() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).issued_in(-3600).expires_in(0).build();

    assert!(harness.validate(claims).await.is_ok());
}

#[tokio::test]
async fn test_missing_exp_rejected() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).without("exp").build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::MissingClaim("exp")
    );
}

#[tokio::test]
async fn test_not_before_in_future_rejected() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).not_before_in(60).build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::NotYetValid
    );
}

#[tokio::test]
async fn test_not_before_in_past_accepted() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).not_before_in(-60).build();

    let result = harness.validate(claims).await.unwrap();
    assert_eq!(result.not_before, Some(NOW - 60));
}

#[tokio::test]
async fn test_iat_within_skew_accepted() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).issued_in(300).build();

    assert!(harness.validate(claims).await.is_ok());
}

#[tokio::test]
async fn test_iat_beyond_skew_rejected() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).issued_in(301).build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::NotYetValid
    );
}

#[tokio::test]
async fn test_missing_iat_rejected() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).without("iat").build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::MissingClaim("iat")
    );
}

#[tokio::test]
async fn test_fractional_exp_in_past_is_expired() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW)
        .with_claim("iat", json!(NOW as f64 - 7200.0 + 0.5))
        .with_claim("exp", json!(NOW as f64 - 10.0 + 0.5))
        .build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::Expired
    );
}

#[tokio::test]
async fn test_fractional_iat_accepted() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW)
        .with_claim("iat", json!(NOW as f64 + 0.25))
        .with_claim("exp", json!(NOW + 3600))
        .build();

    let result = harness.validate(claims).await.unwrap();
    assert_eq!(result.issued_at, NOW);
    assert_eq!(result.expires_at, NOW + 3600);
}

#[tokio::test]
async fn test_issuer_mismatch_rejected() {
    let harness = Harness::new();

    let wrong = TestTokenBuilder::at(NOW)
        .issued_by("https://evil.example.com")
        .build();
    assert_eq!(
        harness.validate(wrong).await.unwrap_err(),
        ValidationError::IssuerMismatch
    );

    // Exact match only, no trailing-slash normalization
    let trailing = TestTokenBuilder::at(NOW)
        .issued_by("https://idp.example.com/")
        .build();
    assert_eq!(
        harness.validate(trailing).await.unwrap_err(),
        ValidationError::IssuerMismatch
    );

    let missing = TestTokenBuilder::at(NOW).without("iss").build();
    assert_eq!(
        harness.validate(missing).await.unwrap_err(),
        ValidationError::IssuerMismatch
    );
}

#[tokio::test]
async fn test_missing_audience_rejected() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW).without("aud").build();

    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::MissingAudience
    );
}

#[tokio::test]
async fn test_audience_forms() {
    let harness = Harness::new();

    // Array containing the portal's audience
    let listed = TestTokenBuilder::at(NOW)
        .with_audience(json!(["other-app", TEST_AUDIENCE]))
        .build();
    let result = harness.validate(listed).await.unwrap();
    assert_eq!(result.audience, vec!["other-app", TEST_AUDIENCE]);

    // Array without it
    let unlisted = TestTokenBuilder::at(NOW)
        .with_audience(json!(["other-app"]))
        .build();
    assert_eq!(
        harness.validate(unlisted).await.unwrap_err(),
        ValidationError::AudienceRejected
    );

    // Any non-empty single string is accepted
    let single = TestTokenBuilder::at(NOW)
        .with_audience(json!("some-other-client"))
        .build();
    assert!(harness.validate(single).await.is_ok());

    let empty = TestTokenBuilder::at(NOW).with_audience(json!("")).build();
    assert_eq!(
        harness.validate(empty).await.unwrap_err(),
        ValidationError::AudienceRejected
    );

    let numeric = TestTokenBuilder::at(NOW).with_audience(json!(42)).build();
    assert_eq!(
        harness.validate(numeric).await.unwrap_err(),
        ValidationError::AudienceRejected
    );
}

#[tokio::test]
async fn test_alg_none_rejected_without_fetch() {
    let harness = Harness::new();
    let token = unsigned_token(
        json!({"alg": "none", "typ": "JWT", "kid": KID}),
        &TestTokenBuilder::at(NOW).build(),
    );

    assert_eq!(
        harness.validator.validate(&token).await.unwrap_err(),
        ValidationError::UnsupportedAlgorithm
    );
    assert_eq!(harness.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_hs256_rejected() {
    let harness = Harness::new();
    let token = sign_hs256(&TestTokenBuilder::at(NOW).build(), KID, b"shared-secret");

    assert_eq!(
        harness.validator.validate(&token).await.unwrap_err(),
        ValidationError::UnsupportedAlgorithm
    );
}

#[tokio::test]
async fn test_bad_signature_rejected() {
    let harness = Harness::new();
    // Signed with a different private key under the published kid
    let forger = TestRsaKey::rotated(KID);
    let token = forger.sign(&TestTokenBuilder::at(NOW).build());

    assert_eq!(
        harness.validator.validate(&token).await.unwrap_err(),
        ValidationError::BadSignature
    );
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let harness = Harness::new();
    let token = harness.key.sign(&TestTokenBuilder::at(NOW).build());

    let (header, rest) = token.split_once('.').unwrap();
    let (_, signature) = rest.split_once('.').unwrap();
    let forged_payload = URL_SAFE_NO_PAD.encode(
        TestTokenBuilder::at(NOW)
            .for_email("mallory@example.com")
            .build()
            .to_string(),
    );
    let forged = format!("{header}.{forged_payload}.{signature}");

    assert_eq!(
        harness.validator.validate(&forged).await.unwrap_err(),
        ValidationError::BadSignature
    );
}

#[tokio::test]
async fn test_unknown_kid_rejected_after_one_refresh() {
    let harness = Harness::new();
    let token = harness
        .key
        .sign_with_kid(&TestTokenBuilder::at(NOW).build(), "unpublished");

    assert_eq!(
        harness.validator.validate(&token).await.unwrap_err(),
        ValidationError::UnknownKey
    );
    // Initial population plus one forced refresh
    assert_eq!(harness.fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_keys_unavailable_when_idp_down() {
    let harness = Harness::with_fetcher(
        TestRsaKey::primary(KID),
        Arc::new(MockJwksFetcher::failing(FetchError::Status(502))),
    );

    assert_eq!(
        harness
            .validate(TestTokenBuilder::at(NOW).build())
            .await
            .unwrap_err(),
        ValidationError::KeysUnavailable(FetchError::Status(502))
    );
}

#[tokio::test]
async fn test_malformed_tokens_rejected() {
    let harness = Harness::new();
    let oversized = "a".repeat(9000);

    for token in ["", "not-a-jwt", "a.b", "!!!.e30.sig", oversized.as_str()] {
        assert_eq!(
            harness.validator.validate(token).await.unwrap_err(),
            ValidationError::Malformed,
            "token {:.20}",
            token
        );
    }

    // Header without kid
    let no_kid = unsigned_token(json!({"alg": "RS256"}), &json!({}));
    assert_eq!(
        harness.validator.validate(&no_kid).await.unwrap_err(),
        ValidationError::Malformed
    );
    assert_eq!(harness.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_email_priority() {
    let harness = Harness::new();

    let all_three = TestTokenBuilder::at(NOW)
        .for_email("generic@example.com")
        .with_claim("app_email", json!("app@example.com"))
        .with_claim("user", json!({"id": "u-1", "email": "nested@example.com"}))
        .build();
    let result = harness.validate(all_three).await.unwrap();
    assert_eq!(result.email, "app@example.com");
    assert_eq!(result.app_email.as_deref(), Some("app@example.com"));

    let generic_and_nested = TestTokenBuilder::at(NOW)
        .for_email("generic@example.com")
        .with_claim("user", json!({"email": "nested@example.com"}))
        .build();
    assert_eq!(
        harness.validate(generic_and_nested).await.unwrap().email,
        "generic@example.com"
    );

    let nested_only = TestTokenBuilder::at(NOW)
        .without("email")
        .with_claim("user", json!({"email": "nested@example.com"}))
        .build();
    assert_eq!(
        harness.validate(nested_only).await.unwrap().email,
        "nested@example.com"
    );
}

#[tokio::test]
async fn test_nested_user_id_satisfies_subject() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW)
        .without("sub")
        .with_claim("user", json!({"id": 1234}))
        .build();

    let result = harness.validate(claims).await.unwrap();
    assert!(result.subject.is_none());
    assert_eq!(result.nested_user_id.as_deref(), Some("1234"));
    assert_eq!(result.external_subject(), "1234");
}

#[tokio::test]
async fn test_numeric_sub_accepted() {
    let harness = Harness::new();
    let claims = TestTokenBuilder::at(NOW)
        .with_claim("sub", json!(5551234))
        .build();

    let result = harness.validate(claims).await.unwrap();
    assert_eq!(result.subject.as_deref(), Some("5551234"));
}

#[tokio::test]
async fn test_missing_identity_claims_rejected() {
    let harness = Harness::new();

    let no_subject = TestTokenBuilder::at(NOW).without("sub").build();
    assert_eq!(
        harness.validate(no_subject).await.unwrap_err(),
        ValidationError::MissingSubject
    );

    let no_email = TestTokenBuilder::at(NOW)
        .without("email")
        .with_claim("app_email", json!(""))
        .build();
    assert_eq!(
        harness.validate(no_email).await.unwrap_err(),
        ValidationError::MissingEmail
    );
}

#[tokio::test]
async fn test_checks_run_in_order() {
    let harness = Harness::new();

    // Expired and wrong issuer: expiry is reported first
    let claims = TestTokenBuilder::at(NOW)
        .expires_in(-10)
        .issued_in(-100)
        .issued_by("https://evil.example.com")
        .without("email")
        .build();
    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::Expired
    );

    // Wrong issuer and missing audience: issuer is reported first
    let claims = TestTokenBuilder::at(NOW)
        .issued_by("https://evil.example.com")
        .without("aud")
        .build();
    assert_eq!(
        harness.validate(claims).await.unwrap_err(),
        ValidationError::IssuerMismatch
    );
}
