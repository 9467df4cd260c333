//! SQLite implementation of the attempt counter repository.

use async_trait::async_trait;
use bulwark_core::{
    Error, Identifier,
    error::{ValidationError, utilities::StorageResultExt},
    repositories::AttemptCounterRepository,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use super::map_sqlx_err;

/// SQLite repository for failed attempt counters.
///
/// Counters are rows keyed by identifier with an absolute expiry in unix
/// milliseconds. Expired rows read as absent and are removed by
/// [`purge_expired`](Self::purge_expired).
pub struct SqliteAttemptCounterRepository {
    pool: SqlitePool,
}

impl SqliteAttemptCounterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = Utc::now().timestamp_millis();

        let result = sqlx::query("DELETE FROM lockout_attempts WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Failed to purge expired attempt counters"))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AttemptCounterRepository for SqliteAttemptCounterRepository {
    async fn increment(
        &self,
        identifier: &Identifier,
        window: Duration,
        ceiling: u32,
    ) -> Result<u32, Error> {
        let now = Utc::now().timestamp_millis();
        let expires_at = now.checked_add(window.num_milliseconds()).ok_or_else(|| {
            ValidationError::InvalidDuration(format!(
                "attempt window of {}s overflows",
                window.num_seconds()
            ))
        })?;

        // Single upsert so concurrent increments serialize on the row
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO lockout_attempts (identifier, count, expires_at)
            VALUES (?, 1, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                count = CASE
                    WHEN lockout_attempts.expires_at <= ? THEN 1
                    ELSE MIN(lockout_attempts.count + 1, ?)
                END,
                expires_at = excluded.expires_at
            RETURNING count
            "#,
        )
        .bind(identifier.as_str())
        .bind(expires_at)
        .bind(now)
        .bind(i64::from(ceiling.max(1)))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to increment attempt counter"))?;

        u32::try_from(count).map_corrupt_err("attempt counter")
    }

    async fn get(&self, identifier: &Identifier) -> Result<u32, Error> {
        let now = Utc::now().timestamp_millis();

        let count: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM lockout_attempts WHERE identifier = ? AND expires_at > ?",
        )
        .bind(identifier.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to get attempt counter"))?;

        match count {
            Some(count) => u32::try_from(count).map_corrupt_err("attempt counter"),
            None => Ok(0),
        }
    }

    async fn clear(&self, identifier: &Identifier) -> Result<(), Error> {
        sqlx::query("DELETE FROM lockout_attempts WHERE identifier = ?")
            .bind(identifier.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_err(e, "Failed to clear attempt counter"))?;

        Ok(())
    }
}
