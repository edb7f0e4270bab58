//! Portal SSO Authentication Library
//!
//! Authenticates inbound portal requests carrying bearer tokens issued by an
//! external Single-Sign-On identity provider (IdP). Tokens are RS256 JWTs
//! verified against the IdP's rotating keys, published at a JWKS endpoint.
//!
//! # Architecture
//!
//! Data flows one way, each layer consuming only its callee's public contract:
//!
//! ```text
//! gate.rs -> auth/jwt.rs -> auth/jwks.rs -> auth/keys.rs
//!    |
//!    +-> directory.rs (external user directory)
//! ```
//!
//! # Modules
//!
//! - `auth` - Key decoding, JWKS cache, token validation, claims
//! - `config` - Service configuration from environment
//! - `directory` - User directory contract and in-memory implementation
//! - `errors` - Gate error taxonomy with HTTP status code mapping
//! - `gate` - Authentication gate (header -> identity)
//! - `handlers` - HTTP request handlers
//! - `middleware` - Axum authentication middleware
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod directory;
pub mod errors;
pub mod gate;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
