//! Typed domain errors for the authentication flow.
//!
//! Every step returns these unchanged; only the HTTP boundary translates them
//! into status codes. Unexpected failures collapse into [`AuthError::Internal`]
//! and are logged in full there, never exposed to callers.

use crate::token::jwt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account temporarily locked")]
    AccountLocked,
    #[error("user not found")]
    UserNotFound,
    #[error("otp code not found")]
    OtpNotFound,
    #[error("otp code expired")]
    OtpExpired,
    #[error("invalid token")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<jwt::Error> for AuthError {
    fn from(err: jwt::Error) -> Self {
        match err {
            jwt::Error::Expired => Self::TokenExpired,
            _ => Self::TokenInvalid,
        }
    }
}
