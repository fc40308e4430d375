//! RS256 JWT encode/decode for session tokens.
//!
//! A token's `scope` claim is either the literal `"VERIFY_OTP"` marker (the
//! token only authorizes OTP submission) or a JSON array of authority names.

use crate::token::KeyMaterial;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1v15::Signature;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::errors::Error as RsaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scope marker carried by second-factor tokens.
pub const VERIFY_OTP_SCOPE: &str = "VERIFY_OTP";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

impl TokenHeader {
    fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
            kid: kid.into(),
        }
    }
}

/// What a session token authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Token only authorizes submitting an OTP code (second step).
    VerifyOtp,
    /// Full session token carrying the account's authority names.
    Authorities(Vec<String>),
}

impl Serialize for Scope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::VerifyOtp => serializer.serialize_str(VERIFY_OTP_SCOPE),
            Self::Authorities(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Marker(String),
            Names(Vec<String>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Marker(marker) if marker == VERIFY_OTP_SCOPE => Ok(Self::VerifyOtp),
            Repr::Marker(other) => Err(serde::de::Error::custom(format!(
                "unknown scope marker: {other}"
            ))),
            Repr::Names(names) => Ok(Self::Authorities(names)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub scope: Scope,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an RS256 signed session token.
///
/// # Errors
///
/// Returns an error if header/claims JSON cannot be encoded.
pub fn sign(keys: &KeyMaterial, claims: &SessionClaims) -> Result<String, Error> {
    let header = TokenHeader::rs256(keys.key_id());
    let header_b64 = b64e_json(&header)?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature: Signature = keys.signing_key().sign(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an RS256 session token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the header names a different algorithm or key id,
/// - the signature is invalid,
/// - the issuer does not match, or the token is expired.
pub fn verify(
    token: &str,
    keys: &KeyMaterial,
    expected_issuer: &str,
    now_unix_seconds: i64,
) -> Result<SessionClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "RS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }
    if header.kid != keys.key_id() {
        return Err(Error::UnknownKid(header.kid));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    keys.verifying_key()
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: SessionClaims = b64d_json(claims_b64)?;
    if claims.iss != expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}
