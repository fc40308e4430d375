//! One-time-password issuance, verification, and invalidation.

use crate::auth::error::AuthError;
use crate::auth::models::{Account, OtpRecord};
use crate::auth::store::OtpStore;
use crate::email::Mailer;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const OTP_CODE_LENGTH: usize = 6;
/// Codes expire five minutes after issuance.
pub const OTP_TTL_SECONDS: i64 = 5 * 60;

const OTP_EMAIL_SUBJECT: &str = "Your verification code";

/// Opaque confirmation returned by [`OtpLifecycle::issue`]. The raw code is
/// only ever delivered out of band.
#[derive(Debug, Clone)]
pub struct OtpReceipt {
    pub otp_id: Uuid,
    pub ttl_seconds: i64,
}

#[derive(Clone)]
pub struct OtpLifecycle {
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn Mailer>,
    ttl_seconds: i64,
}

impl OtpLifecycle {
    #[must_use]
    pub fn new(store: Arc<dyn OtpStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            ttl_seconds: OTP_TTL_SECONDS,
        }
    }

    /// Replace any outstanding code for the account with a fresh one and
    /// email it. The store replacement commits before the send, so a failed
    /// delivery leaves consistent OTP state behind; the client's retry mints
    /// a new code and invalidates this one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if the store or the mail delivery
    /// fails.
    pub async fn issue(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<OtpReceipt, AuthError> {
        let code = generate_code();
        let record = OtpRecord {
            otp_id: Uuid::new_v4(),
            account_id: account.account_id,
            code: code.clone(),
            issued_at: now,
            ttl_seconds: self.ttl_seconds,
            valid: true,
        };
        let otp_id = record.otp_id;
        self.store.replace_active(record).await?;

        info!(account_id = %account.account_id, %otp_id, "otp code issued");

        let body = format!(
            "Your one-time code is {code}. It expires in {} minutes.",
            self.ttl_seconds / 60
        );
        self.mailer
            .send(&account.email_address, OTP_EMAIL_SUBJECT, &body)
            .await
            .context("failed to send otp email")?;

        Ok(OtpReceipt {
            otp_id,
            ttl_seconds: self.ttl_seconds,
        })
    }

    /// Check a submitted code against the account's active record and consume
    /// it. Consumption is a compare-and-set on the `valid` flag, so a code
    /// can be redeemed at most once even under concurrent submissions.
    ///
    /// # Errors
    ///
    /// - [`AuthError::OtpNotFound`]: no active record, code mismatch, or the
    ///   record was already consumed.
    /// - [`AuthError::OtpExpired`]: the code matched but its TTL elapsed; the
    ///   record is invalidated.
    pub async fn verify(
        &self,
        account: &Account,
        submitted_code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some(record) = self.store.find_active(account.account_id).await? else {
            return Err(AuthError::OtpNotFound);
        };

        if record.code != submitted_code {
            return Err(AuthError::OtpNotFound);
        }

        if record.expired(now) {
            self.store.invalidate(record.otp_id).await?;
            return Err(AuthError::OtpExpired);
        }

        if !self.store.invalidate(record.otp_id).await? {
            // Lost a concurrent consume race; the code is spent.
            return Err(AuthError::OtpNotFound);
        }

        info!(account_id = %account.account_id, otp_id = %record.otp_id, "otp code consumed");
        Ok(())
    }
}

/// Fixed-length numeric code drawn from the operating system's CSPRNG.
fn generate_code() -> String {
    let mut rng = OsRng;
    (0..OTP_CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
