//! The three-step authentication flow.
//!
//! `AWAITING_CREDENTIALS -> AWAITING_OTP -> AUTHENTICATED`, with no in-flight
//! state persisted anywhere: the `VERIFY_OTP`-scoped token returned by step
//! one is the only carrier of "awaiting OTP" state, so any instance can serve
//! step two.

use crate::auth::error::AuthError;
use crate::auth::lockout::LockoutPolicy;
use crate::auth::models::Account;
use crate::auth::otp::OtpLifecycle;
use crate::auth::password::PasswordHasher;
use crate::auth::store::CredentialStore;
use crate::token::jwt::Scope;
use crate::token::{TokenIssuer, TokenValidator, ACCESS_TOKEN_TTL, OTP_TOKEN_TTL};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

/// Step-one result: the second-factor token plus its lifetime in seconds.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub otp_token: String,
    pub expires_in: i64,
}

/// Step-three result: a full session.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub access_token: String,
    pub expires_in: i64,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthenticationFlow {
    credentials: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    lockout: LockoutPolicy,
    otp: OtpLifecycle,
    issuer: TokenIssuer,
    validator: TokenValidator,
}

impl AuthenticationFlow {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        lockout: LockoutPolicy,
        otp: OtpLifecycle,
        issuer: TokenIssuer,
        validator: TokenValidator,
    ) -> Self {
        Self {
            credentials,
            hasher,
            lockout,
            otp,
            issuer,
            validator,
        }
    }

    /// Step one: verify the password, count failures toward the lockout, and
    /// on success issue an OTP (delivered by email) plus the `VERIFY_OTP`
    /// token that resumes the flow.
    ///
    /// A locked account answers [`AuthError::AccountLocked`] whether or not
    /// the submitted password was correct.
    ///
    /// # Errors
    ///
    /// [`AuthError::UserNotFound`], [`AuthError::AccountLocked`],
    /// [`AuthError::InvalidCredentials`], or [`AuthError::Internal`].
    pub async fn first_step(
        &self,
        email: &str,
        password: &str,
    ) -> Result<OtpChallenge, AuthError> {
        let now = Utc::now();
        let account = self
            .credentials
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.lockout.check_not_locked(&account, now)?;

        if !self.hasher.matches(password, &account.password_hash)? {
            let state = self.lockout.record_failure(account.account_id).await?;
            if state.locked() {
                return Err(AuthError::AccountLocked);
            }
            info!(email = %account.email_address, "invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.usable() {
            info!(email = %account.email_address, "login refused for disabled or expired account");
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.record_success(account.account_id).await?;

        self.otp.issue(&account, now).await?;
        let otp_token = self
            .issuer
            .issue_otp_token(&account.username, now.timestamp())?;

        info!(username = %account.username, "otp challenge issued");
        Ok(OtpChallenge {
            otp_token,
            expires_in: OTP_TOKEN_TTL,
        })
    }

    /// Step two: redeem the `VERIFY_OTP` token plus the emailed code, then
    /// proceed directly to step three.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenInvalid`] / [`AuthError::TokenExpired`] for the
    /// bearer token, [`AuthError::UserNotFound`] if the subject no longer
    /// resolves, and [`AuthError::OtpNotFound`] / [`AuthError::OtpExpired`]
    /// from code verification.
    pub async fn second_step(
        &self,
        otp_token: &str,
        submitted_code: &str,
    ) -> Result<SessionGrant, AuthError> {
        let now = Utc::now();
        let identity = self.validator.validate(otp_token, now.timestamp())?;
        if identity.scope != Scope::VerifyOtp {
            // Only the second-factor token authorizes OTP submission.
            return Err(AuthError::TokenInvalid);
        }

        let account = self
            .credentials
            .find_by_username(&identity.subject)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.otp.verify(&account, submitted_code, now).await?;

        self.issue_session(&account, now)
    }

    /// Step three: mint the full session token from the account's live
    /// authority set.
    fn issue_session(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<SessionGrant, AuthError> {
        let access_token = self.issuer.issue_access_token(
            &account.username,
            account.authorities.clone(),
            now.timestamp(),
        )?;

        info!(username = %account.username, "access token issued");
        Ok(SessionGrant {
            access_token,
            expires_in: ACCESS_TOKEN_TTL,
            username: account.username.clone(),
        })
    }

    /// Resolve a verified bearer subject against live account state. Used by
    /// the request filter on protected endpoints.
    ///
    /// # Errors
    ///
    /// [`AuthError::UserNotFound`] when the subject does not resolve.
    pub async fn resolve_subject(&self, username: &str) -> Result<Account, AuthError> {
        match self.credentials.find_by_username(username).await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(AuthError::UserNotFound),
            Err(err) => {
                error!("failed to resolve token subject: {err:#}");
                Err(AuthError::Internal(err))
            }
        }
    }
}
