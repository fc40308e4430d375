//! Account and OTP rows as the core sees them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// An account with its authority names flattened from the join table.
/// Mutated only through [`crate::auth::store::CredentialStore`] operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: Uuid,
    pub username: String,
    pub email_address: String,
    pub password_hash: String,
    pub enabled: bool,
    pub account_non_expired: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub authorities: Vec<String>,
}

impl Account {
    /// Accounts sign in only while enabled and unexpired.
    #[must_use]
    pub fn usable(&self) -> bool {
        self.enabled && self.account_non_expired
    }
}

impl<'r> FromRow<'r, PgRow> for Account {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            account_id: row.try_get("account_id")?,
            username: row.try_get("username")?,
            email_address: row.try_get("email_address")?,
            password_hash: row.try_get("password_hash")?,
            enabled: row.try_get("enabled")?,
            account_non_expired: row.try_get("account_non_expired")?,
            failed_attempts: row.try_get("failed_attempts")?,
            locked_until: row.try_get("locked_until")?,
            authorities: row.try_get("authorities")?,
        })
    }
}

/// Failed-attempt state after an atomic increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutState {
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    /// Whether this increment tripped (or extended) the lockout.
    #[must_use]
    pub fn locked(&self) -> bool {
        self.locked_until.is_some()
    }
}

/// One issued OTP code. Rows are invalidated on consumption or expiry, never
/// deleted, so the table doubles as an audit trail.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub otp_id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: i64,
    pub valid: bool,
}

impl OtpRecord {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.ttl_seconds)
    }

    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}

impl<'r> FromRow<'r, PgRow> for OtpRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            otp_id: row.try_get("otp_id")?,
            account_id: row.try_get("account_id")?,
            code: row.try_get("code")?,
            issued_at: row.try_get("issued_at")?,
            ttl_seconds: row.try_get("ttl_seconds")?,
            valid: row.try_get("valid")?,
        })
    }
}
