//! Mints scoped session tokens.

use crate::token::jwt::{self, Scope, SessionClaims};
use crate::token::KeyMaterial;
use std::sync::Arc;

/// Full session tokens live for a day.
pub const ACCESS_TOKEN_TTL: i64 = 60 * 60 * 24;
/// Second-factor tokens only need to cover the OTP entry window.
pub const OTP_TOKEN_TTL: i64 = 60 * 20;

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyMaterial>,
    issuer: String,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(keys: Arc<KeyMaterial>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    /// Sign a full access token carrying the account's authority names.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_access_token(
        &self,
        username: &str,
        authorities: Vec<String>,
        now: i64,
    ) -> Result<String, jwt::Error> {
        let claims = SessionClaims {
            iss: self.issuer.clone(),
            sub: username.to_string(),
            iat: now,
            exp: now + ACCESS_TOKEN_TTL,
            scope: Scope::Authorities(authorities),
        };
        jwt::sign(&self.keys, &claims)
    }

    /// Sign a `VERIFY_OTP`-scoped token that carries the "awaiting OTP" state
    /// between the first and second authentication steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_otp_token(&self, username: &str, now: i64) -> Result<String, jwt::Error> {
        let claims = SessionClaims {
            iss: self.issuer.clone(),
            sub: username.to_string(),
            iat: now,
            exp: now + OTP_TOKEN_TTL,
            scope: Scope::VerifyOtp,
        };
        jwt::sign(&self.keys, &claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::test_keys::test_key_material;

    const NOW: i64 = 1_700_000_000;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(Arc::new(test_key_material()), "portineria-test")
    }

    #[test]
    fn access_token_carries_authorities_and_daily_expiry() -> Result<(), jwt::Error> {
        let issuer = issuer();
        let keys = test_key_material();
        let token =
            issuer.issue_access_token("alice", vec!["ROLE_RESIDENT".to_string()], NOW)?;
        let claims = jwt::verify(&token, &keys, "portineria-test", NOW)?;
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + ACCESS_TOKEN_TTL);
        assert_eq!(
            claims.scope,
            Scope::Authorities(vec!["ROLE_RESIDENT".to_string()])
        );
        Ok(())
    }

    #[test]
    fn otp_token_is_marker_scoped_and_short_lived() -> Result<(), jwt::Error> {
        let issuer = issuer();
        let keys = test_key_material();
        let token = issuer.issue_otp_token("alice", NOW)?;
        let claims = jwt::verify(&token, &keys, "portineria-test", NOW)?;
        assert_eq!(claims.scope, Scope::VerifyOtp);
        assert_eq!(claims.exp, NOW + OTP_TOKEN_TTL);
        Ok(())
    }
}
