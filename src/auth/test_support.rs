//! In-memory stores and doubles shared by the auth test suites. The mutex
//! around each map serializes per-account mutation, matching the guarantees
//! the Postgres statements provide.

use crate::auth::models::{Account, LockoutState, OtpRecord};
use crate::auth::password::PasswordHasher;
use crate::auth::store::{CredentialStore, OtpStore};
use crate::email::Mailer;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

pub(crate) fn test_account(username: &str, email: &str, password_hash: &str) -> Account {
    Account {
        account_id: Uuid::new_v4(),
        username: username.to_string(),
        email_address: email.to_string(),
        password_hash: password_hash.to_string(),
        enabled: true,
        account_non_expired: true,
        failed_attempts: 0,
        locked_until: None,
        authorities: vec!["ROLE_RESIDENT".to_string()],
    }
}

#[derive(Default)]
pub(crate) struct MemoryCredentialStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryCredentialStore {
    pub(crate) fn add(&self, account: Account) {
        self.accounts
            .lock()
            .expect("accounts lock")
            .insert(account.account_id, account);
    }

    pub(crate) fn get(&self, account_id: Uuid) -> Option<Account> {
        self.accounts
            .lock()
            .expect("accounts lock")
            .get(&account_id)
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .expect("accounts lock")
            .values()
            .find(|account| account.email_address == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .expect("accounts lock")
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn record_failure(
        &self,
        account_id: Uuid,
        threshold: i32,
        lock_window: Duration,
    ) -> Result<LockoutState> {
        let now = Utc::now();
        let mut accounts = self.accounts.lock().expect("accounts lock");
        let account = accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow!("unknown account: {account_id}"))?;

        let expired_lock = account
            .locked_until
            .is_some_and(|locked_until| locked_until <= now);
        account.failed_attempts = if expired_lock {
            1
        } else {
            account.failed_attempts + 1
        };
        account.locked_until = if account.failed_attempts >= threshold {
            Some(now + lock_window)
        } else {
            None
        };

        Ok(LockoutState {
            failed_attempts: account.failed_attempts,
            locked_until: account.locked_until,
        })
    }

    async fn record_success(&self, account_id: Uuid) -> Result<()> {
        let mut accounts = self.accounts.lock().expect("accounts lock");
        let account = accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow!("unknown account: {account_id}"))?;
        account.failed_attempts = 0;
        account.locked_until = None;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryOtpStore {
    records: Mutex<Vec<OtpRecord>>,
}

impl MemoryOtpStore {
    pub(crate) fn records_for(&self, account_id: Uuid) -> Vec<OtpRecord> {
        self.records
            .lock()
            .expect("otp lock")
            .iter()
            .filter(|record| record.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn replace_active(&self, record: OtpRecord) -> Result<()> {
        let mut records = self.records.lock().expect("otp lock");
        for existing in records
            .iter_mut()
            .filter(|existing| existing.account_id == record.account_id)
        {
            existing.valid = false;
        }
        records.push(record);
        Ok(())
    }

    async fn find_active(&self, account_id: Uuid) -> Result<Option<OtpRecord>> {
        Ok(self
            .records
            .lock()
            .expect("otp lock")
            .iter()
            .find(|record| record.account_id == account_id && record.valid)
            .cloned())
    }

    async fn invalidate(&self, otp_id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().expect("otp lock");
        match records
            .iter_mut()
            .find(|record| record.otp_id == otp_id && record.valid)
        {
            Some(record) => {
                record.valid = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SentMail {
    pub(crate) to: String,
    pub(crate) subject: String,
    pub(crate) body: String,
}

#[derive(Default)]
pub(crate) struct CapturingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl CapturingMailer {
    pub(crate) fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer lock").clone()
    }

    /// The six-digit code carried by the most recent message, if any.
    pub(crate) fn last_code(&self) -> Option<String> {
        self.sent().last().and_then(|mail| {
            mail.body
                .split(|c: char| !c.is_ascii_digit())
                .find(|chunk| chunk.len() == crate::auth::otp::OTP_CODE_LENGTH)
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().expect("mailer lock").push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub(crate) struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
        Err(anyhow!("smtp relay unavailable"))
    }
}

/// Cheap hasher for flow tests: a password matches when it equals the stored
/// "hash" verbatim.
pub(crate) struct PlainPasswordHasher;

impl PasswordHasher for PlainPasswordHasher {
    fn hash(&self, password: &str) -> Result<String> {
        Ok(password.to_string())
    }

    fn matches(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(password == hash)
    }
}
