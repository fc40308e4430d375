//! Verifies incoming bearer tokens and resolves the identity they name.

use crate::token::jwt::{self, Scope};
use crate::token::KeyMaterial;
use std::sync::Arc;

/// Subject and scope recovered from a verified token. Authorization is
/// derived later from the live account record, not from `scope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub subject: String,
    pub scope: Scope,
}

#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<KeyMaterial>,
    issuer: String,
}

impl TokenValidator {
    #[must_use]
    pub fn new(keys: Arc<KeyMaterial>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    /// Decode and verify a token string.
    ///
    /// # Errors
    ///
    /// Returns [`jwt::Error::Expired`] for expired tokens and other
    /// [`jwt::Error`] variants for malformed or forged ones.
    pub fn validate(&self, token: &str, now: i64) -> Result<TokenIdentity, jwt::Error> {
        let claims = jwt::verify(token, &self.keys, &self.issuer, now)?;
        Ok(TokenIdentity {
            subject: claims.sub,
            scope: claims.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::test_keys::test_key_material;
    use crate::token::TokenIssuer;

    const NOW: i64 = 1_700_000_000;

    fn pair() -> (TokenIssuer, TokenValidator) {
        let keys = Arc::new(test_key_material());
        (
            TokenIssuer::new(keys.clone(), "portineria-test"),
            TokenValidator::new(keys, "portineria-test"),
        )
    }

    #[test]
    fn resolves_subject_and_scope() -> Result<(), jwt::Error> {
        let (issuer, validator) = pair();
        let token = issuer.issue_otp_token("alice", NOW)?;
        let identity = validator.validate(&token, NOW)?;
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.scope, Scope::VerifyOtp);
        Ok(())
    }

    #[test]
    fn expired_token_is_distinct_from_invalid() -> Result<(), jwt::Error> {
        let (issuer, validator) = pair();
        let token = issuer.issue_otp_token("alice", NOW)?;
        let result = validator.validate(&token, NOW + crate::token::OTP_TOKEN_TTL + 1);
        assert!(matches!(result, Err(jwt::Error::Expired)));

        let result = validator.validate("not-a-token", NOW);
        assert!(matches!(result, Err(jwt::Error::TokenFormat)));
        Ok(())
    }
}
