//! Failed-attempt tracking and temporary account blocking.

use crate::auth::error::AuthError;
use crate::auth::models::{Account, LockoutState};
use crate::auth::store::CredentialStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Consecutive failures before an account is blocked.
pub const MAX_LOGIN_ATTEMPTS: i32 = 5;
/// How long a tripped lockout lasts.
pub const LOCK_WINDOW_SECONDS: i64 = 5 * 60;

#[derive(Clone)]
pub struct LockoutPolicy {
    store: Arc<dyn CredentialStore>,
    threshold: i32,
    lock_window: Duration,
}

impl LockoutPolicy {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            threshold: MAX_LOGIN_ATTEMPTS,
            lock_window: Duration::seconds(LOCK_WINDOW_SECONDS),
        }
    }

    /// Fail with [`AuthError::AccountLocked`] while a lockout window is
    /// active. No side effect; expiry is evaluated lazily at the next
    /// attempt, there is no background sweep.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccountLocked`] when `locked_until` is in the
    /// future.
    pub fn check_not_locked(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        match account.locked_until {
            Some(locked_until) if locked_until > now => Err(AuthError::AccountLocked),
            _ => Ok(()),
        }
    }

    /// Count one failed attempt; trips the lockout when the post-increment
    /// counter reaches the threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the store update fails.
    pub async fn record_failure(&self, account_id: Uuid) -> Result<LockoutState, AuthError> {
        let state = self
            .store
            .record_failure(account_id, self.threshold, self.lock_window)
            .await?;

        if state.locked() {
            warn!(
                %account_id,
                attempts = state.failed_attempts,
                "account locked after too many failed attempts"
            );
        }

        Ok(state)
    }

    /// Reset the counter and clear any lockout after a successful password
    /// check.
    ///
    /// # Errors
    ///
    /// Returns an error if the store update fails.
    pub async fn record_success(&self, account_id: Uuid) -> Result<(), AuthError> {
        self.store.record_success(account_id).await?;
        Ok(())
    }
}
