//! Authentication module.
//!
//! Handles bearer-token verification against the IdP's JWKS endpoint.
//!
//! # Components
//!
//! - `clock` - Injectable wall clock
//! - `keys` - Key Material Decoder (JWK entry -> verification key)
//! - `jwks` - JWKS Key Cache with single-flight refresh
//! - `jwt` - Token Validator (signature + claim policy)
//! - `claims` - Raw and normalized token claims

pub mod claims;
pub mod clock;
pub mod jwks;
pub mod jwt;
pub mod keys;

pub use claims::TokenClaims;
pub use clock::{Clock, SystemClock};
pub use jwks::{
    FetchError, HttpJwksFetcher, JwksCache, JwksDocument, JwksFetcher, KeyLookupError, KeySet,
};
pub use jwt::{TokenValidator, ValidationError};
pub use keys::{decode_jwk, CachedKey, Jwk, KeyDecodeError};
