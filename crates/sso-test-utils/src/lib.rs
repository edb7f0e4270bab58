//! # SSO Test Utilities
//!
//! Shared test utilities for the SSO authentication crate.
//!
//! This crate provides:
//! - Deterministic RSA key fixtures (fixed keys for reproducible tests)
//! - Test data builders (TestTokenBuilder)
//! - Mock JWKS transport and a manually driven clock
//! - User directory helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sso_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestRsaKey::primary("idp-key-01");
//!     let fetcher = MockJwksFetcher::serving(jwks_json(&[&key]));
//!
//!     let token = key.sign(&TestTokenBuilder::at(NOW).for_email("a@example.com").build());
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_directory;
pub mod mock_jwks;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_directory::*;
pub use mock_jwks::*;
pub use token_builders::*;

/// Issuer used by test tokens and test validators.
pub const TEST_ISSUER: &str = "https://idp.example.com";

/// Portal audience used by test tokens and test validators.
pub const TEST_AUDIENCE: &str = "portal";

/// Fixed "now" (2023-11-14T22:13:20Z) for clock-driven tests.
pub const NOW: i64 = 1_700_000_000;
