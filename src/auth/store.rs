//! Store seams for account and OTP state.
//!
//! The operations that must be atomic per account (failed-attempt counting,
//! invalidate-then-insert OTP replacement, consume-once invalidation) live on
//! the store so each backend can provide the guarantee natively: a single
//! conditional UPDATE / transaction in Postgres, a mutex-held map in test
//! doubles.

use crate::auth::models::{Account, LockoutState, OtpRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Count one failed login attempt. The increment and the
    /// threshold comparison happen atomically; two concurrent failures can
    /// never both observe the pre-threshold counter. An already-elapsed
    /// lockout window resets the counter, so the attempt counts as the first
    /// of a fresh window.
    async fn record_failure(
        &self,
        account_id: Uuid,
        threshold: i32,
        lock_window: Duration,
    ) -> Result<LockoutState>;

    /// Reset the failed-attempt counter and clear any lockout.
    async fn record_success(&self, account_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Invalidate every valid code for the record's account, then persist the
    /// new record, atomically: at most one code per account is ever valid.
    async fn replace_active(&self, record: OtpRecord) -> Result<()>;

    /// The account's currently valid code, if any.
    async fn find_active(&self, account_id: Uuid) -> Result<Option<OtpRecord>>;

    /// Flip a record from valid to invalid. Returns `false` when the record
    /// was already invalid (consumed or unknown), so exactly one caller wins
    /// a concurrent consume race.
    async fn invalidate(&self, otp_id: Uuid) -> Result<bool>;
}
