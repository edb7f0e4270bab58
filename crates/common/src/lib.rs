//! Common utilities and types shared across portal SSO components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limit, kid extraction, iat checks, JWK components)
pub mod jwt;
