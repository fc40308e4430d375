//! JSON Web Key Set publication for the active signing key.

use crate::token::jwt;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Serialize this JWKS to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Find a key by `kid` (Key ID).
    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    /// Build a JWK from an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be converted to a JWK.
    pub fn from_rsa_public_key(
        public_key: &RsaPublicKey,
        kid: impl Into<String>,
    ) -> Result<Self, jwt::Error> {
        let n = Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be());
        let e = Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be());
        Ok(Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.into(),
            n,
            e,
        })
    }

    /// Convert this JWK back to an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base64url values cannot be decoded or the RSA
    /// key is invalid.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, jwt::Error> {
        let n_bytes = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| jwt::Error::Base64)?;
        let e_bytes = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| jwt::Error::Base64)?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);
        RsaPublicKey::new(n, e).map_err(jwt::Error::Rsa)
    }
}
