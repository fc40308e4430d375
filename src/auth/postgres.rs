//! Postgres-backed credential and OTP stores.
//!
//! Per-account atomicity comes from single conditional UPDATEs (lockout
//! counting, consume-once invalidation) and one transaction around the
//! invalidate-then-insert OTP replacement; the partial unique index on
//! `otp_codes (account_id) WHERE valid` backs the single-active-code
//! invariant at the schema level.

use crate::auth::models::{Account, LockoutState, OtpRecord};
use crate::auth::store::{CredentialStore, OtpStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

const SELECT_ACCOUNT: &str = r"
    SELECT accounts.account_id, accounts.username, accounts.email_address,
           accounts.password_hash, accounts.enabled, accounts.account_non_expired,
           accounts.failed_attempts, accounts.locked_until,
           COALESCE(
               ARRAY_AGG(authorities.name ORDER BY authorities.name)
                   FILTER (WHERE account_authorities.active),
               '{}'
           ) AS authorities
    FROM accounts
    LEFT JOIN account_authorities
           ON account_authorities.account_id = accounts.account_id
    LEFT JOIN authorities
           ON authorities.authority_id = account_authorities.authority_id
";

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let query = format!(
            "{SELECT_ACCOUNT} WHERE accounts.{column} = $1 GROUP BY accounts.account_id"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .with_context(|| format!("failed to load account by {column}"))
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.find_by("email_address", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.find_by("username", username).await
    }

    async fn record_failure(
        &self,
        account_id: Uuid,
        threshold: i32,
        lock_window: Duration,
    ) -> Result<LockoutState> {
        // One statement so concurrent failures serialize on the row: the
        // incremented counter is compared against the threshold in the same
        // UPDATE, and an already-elapsed lockout restarts the count at 1.
        let query = r"
            UPDATE accounts
            SET failed_attempts = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= NOW() THEN 1
                    ELSE failed_attempts + 1
                END,
                locked_until = CASE
                    WHEN (CASE
                              WHEN locked_until IS NOT NULL AND locked_until <= NOW() THEN 1
                              ELSE failed_attempts + 1
                          END) >= $2
                        THEN NOW() + ($3 * INTERVAL '1 second')
                    ELSE NULL
                END
            WHERE account_id = $1
            RETURNING failed_attempts, locked_until
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(account_id)
            .bind(threshold)
            .bind(lock_window.num_seconds())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login failure")?;

        Ok(LockoutState {
            failed_attempts: row.get("failed_attempts"),
            locked_until: row.get("locked_until"),
        })
    }

    async fn record_success(&self, account_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE accounts
            SET failed_attempts = 0,
                locked_until = NULL
            WHERE account_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to reset login failures")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn replace_active(&self, record: OtpRecord) -> Result<()> {
        // Invalidation happens-before the insert, inside one transaction, so
        // concurrent issuers for the same account cannot leave two valid rows.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin otp transaction")?;

        let query = "UPDATE otp_codes SET valid = FALSE WHERE account_id = $1 AND valid";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(record.account_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to invalidate previous otp codes")?;

        let query = r"
            INSERT INTO otp_codes (otp_id, account_id, code, issued_at, ttl_seconds, valid)
            VALUES ($1, $2, $3, $4, $5, TRUE)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(record.otp_id)
            .bind(record.account_id)
            .bind(&record.code)
            .bind(record.issued_at)
            .bind(record.ttl_seconds)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert otp code")?;

        tx.commit().await.context("failed to commit otp code")?;
        Ok(())
    }

    async fn find_active(&self, account_id: Uuid) -> Result<Option<OtpRecord>> {
        let query = r"
            SELECT otp_id, account_id, code, issued_at, ttl_seconds, valid
            FROM otp_codes
            WHERE account_id = $1
              AND valid
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, OtpRecord>(query)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load active otp code")
    }

    async fn invalidate(&self, otp_id: Uuid) -> Result<bool> {
        // Compare-and-set on the valid flag: only one of two concurrent
        // consumers observes a changed row.
        let query = "UPDATE otp_codes SET valid = FALSE WHERE otp_id = $1 AND valid";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(otp_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to invalidate otp code")?;
        Ok(result.rows_affected() == 1)
    }
}

/// Seed an initial enabled account with `ROLE_ADMIN` unless the email is
/// already taken. Used once at startup when bootstrap credentials are
/// configured.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub async fn bootstrap_account(
    pool: &PgPool,
    email: &str,
    username: &str,
    password_hash: &str,
) -> Result<bool> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to begin bootstrap transaction")?;

    let query = r"
        INSERT INTO accounts (username, email_address, password_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (email_address) DO NOTHING
        RETURNING account_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert bootstrap account")?;

    let Some(row) = row else {
        tx.commit().await.context("failed to commit bootstrap noop")?;
        return Ok(false);
    };
    let account_id: Uuid = row.get("account_id");

    let query = r"
        INSERT INTO authorities (name)
        VALUES ('ROLE_ADMIN')
        ON CONFLICT (name) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to ensure bootstrap authority")?;

    let query = r"
        INSERT INTO account_authorities (account_id, authority_id)
        SELECT $1, authority_id FROM authorities WHERE name = 'ROLE_ADMIN'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(account_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to grant bootstrap authority")?;

    tx.commit()
        .await
        .context("failed to commit bootstrap account")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
    use std::time::Duration as StdDuration;

    fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("invalid")
            .database("invalid")
            .ssl_mode(PgSslMode::Disable);
        PgPoolOptions::new()
            .acquire_timeout(StdDuration::from_millis(200))
            .connect_lazy_with(options)
    }

    #[tokio::test]
    async fn credential_store_propagates_db_failures() {
        let store = PgCredentialStore::new(unreachable_pool());
        assert!(store.find_by_email("a@x.com").await.is_err());
        assert!(store
            .record_failure(Uuid::new_v4(), 5, Duration::seconds(300))
            .await
            .is_err());
        assert!(store.record_success(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn otp_store_propagates_db_failures() {
        let store = PgOtpStore::new(unreachable_pool());
        assert!(store.find_active(Uuid::new_v4()).await.is_err());
        assert!(store.invalidate(Uuid::new_v4()).await.is_err());
    }
}
