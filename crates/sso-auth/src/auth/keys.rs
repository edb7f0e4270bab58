//! Key Material Decoder.
//!
//! Converts one JWKS entry into a [`CachedKey`] usable for RS256 signature
//! verification. Every constraint failure is a [`KeyDecodeError`]; the JWKS
//! cache skips failing entries instead of rejecting the whole key set.
//!
//! # Accepted entries
//!
//! Only entries declaring all of the following are decoded:
//! - `kty` = `"RSA"`
//! - `use` = `"sig"`
//! - `alg` = `"RS256"`
//! - non-empty `kid`
//! - `n` and `e` in base64url

use common::jwt::decode_rsa_component;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Required key type.
const RSA_KEY_TYPE: &str = "RSA";

/// Required key use.
const SIGNATURE_USE: &str = "sig";

/// Required algorithm name.
const RS256: &str = "RS256";

/// JSON Web Key entry as published in the IdP's JWKS document.
///
/// Every field except `kty` is optional at the serde level so that missing
/// fields are reported as specific [`KeyDecodeError`]s rather than parse errors.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC", ...).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use (must be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm (must be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// Reasons a JWKS entry cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("JWK entry is not a valid key object: {0}")]
    Malformed(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Key is not a signing key (use={0:?})")]
    NotSigningKey(Option<String>),

    #[error("Unsupported key algorithm: {0:?}")]
    UnsupportedAlgorithm(Option<String>),

    #[error("JWK entry has no key ID")]
    MissingKid,

    #[error("JWK entry is missing RSA component '{0}'")]
    MissingComponent(&'static str),

    #[error("JWK entry has an invalid RSA component '{0}'")]
    InvalidComponent(&'static str),
}

impl KeyDecodeError {
    /// Whether the entry is simply not meant for us (another key type or a
    /// non-signing key) rather than a broken RSA signing key.
    pub fn is_foreign_key(&self) -> bool {
        matches!(
            self,
            KeyDecodeError::UnsupportedKeyType(_) | KeyDecodeError::NotSigningKey(_)
        )
    }
}

/// A decoded RS256 verification key.
///
/// Immutable once constructed; the JWKS cache shares it behind an `Arc`.
#[derive(Clone)]
pub struct CachedKey {
    kid: String,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl CachedKey {
    /// Key ID this key is published under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Verification key material.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Signature algorithm; always RS256.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl fmt::Debug for CachedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Decode a raw JWKS entry.
///
/// # Errors
///
/// Returns `KeyDecodeError::Malformed` if the entry does not deserialize as a
/// [`Jwk`], otherwise whatever [`decode_jwk`] returns.
pub fn decode_jwk_value(entry: &serde_json::Value) -> Result<CachedKey, KeyDecodeError> {
    let jwk = Jwk::deserialize(entry).map_err(|e| KeyDecodeError::Malformed(e.to_string()))?;
    decode_jwk(&jwk)
}

/// Decode a [`Jwk`] into a verification key.
///
/// # Errors
///
/// Returns the first violated constraint, checked in the order: key type,
/// use, algorithm, key ID, modulus, exponent.
pub fn decode_jwk(jwk: &Jwk) -> Result<CachedKey, KeyDecodeError> {
    if jwk.kty != RSA_KEY_TYPE {
        return Err(KeyDecodeError::UnsupportedKeyType(jwk.kty.clone()));
    }

    if jwk.key_use.as_deref() != Some(SIGNATURE_USE) {
        return Err(KeyDecodeError::NotSigningKey(jwk.key_use.clone()));
    }

    if jwk.alg.as_deref() != Some(RS256) {
        return Err(KeyDecodeError::UnsupportedAlgorithm(jwk.alg.clone()));
    }

    let kid = jwk
        .kid
        .as_deref()
        .filter(|kid| !kid.is_empty())
        .ok_or(KeyDecodeError::MissingKid)?;

    let modulus = component(jwk.n.as_deref(), "n")?;
    let exponent = component(jwk.e.as_deref(), "e")?;

    Ok(CachedKey {
        kid: kid.to_string(),
        decoding_key: DecodingKey::from_rsa_raw_components(&modulus, &exponent),
        algorithm: Algorithm::RS256,
    })
}

fn component(value: Option<&str>, name: &'static str) -> Result<Vec<u8>, KeyDecodeError> {
    let encoded = value.ok_or(KeyDecodeError::MissingComponent(name))?;
    decode_rsa_component(encoded).map_err(|_| KeyDecodeError::InvalidComponent(name))
}
