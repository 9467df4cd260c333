//! SQLite implementation of the lock state repository.

use async_trait::async_trait;
use bulwark_core::{
    Error, Identifier,
    error::{ValidationError, utilities::StorageResultExt},
    repositories::LockStateRepository,
    storage::{LockDuration, LockExpiry, LockOrigin, LockRecord},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use super::map_sqlx_err;

/// SQLite repository for lock markers.
///
/// `expires_at` is unix milliseconds, `NULL` for an indefinite lock.
pub struct SqliteLockStateRepository {
    pool: SqlitePool,
}

impl SqliteLockStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = Utc::now().timestamp_millis();

        let result =
            sqlx::query("DELETE FROM lockout_locks WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_err(e, "Failed to purge expired locks"))?;

        Ok(result.rows_affected())
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLockRecord {
    identifier: String,
    locked_at: i64,
    origin: String,
    reason: Option<String>,
}

impl TryFrom<SqliteLockRecord> for LockRecord {
    type Error = Error;

    fn try_from(row: SqliteLockRecord) -> Result<Self, Self::Error> {
        Ok(LockRecord {
            identifier: Identifier::parse(&row.identifier).map_corrupt_err("lock identifier")?,
            locked_at: DateTime::from_timestamp_millis(row.locked_at)
                .ok_or("timestamp out of range")
                .map_corrupt_err("lock timestamp")?,
            origin: row.origin.parse::<LockOrigin>().map_corrupt_err("lock origin")?,
            reason: row.reason,
        })
    }
}

fn expires_at(duration: LockDuration, now: i64) -> Result<Option<i64>, Error> {
    duration
        .ttl_millis()
        .map(|millis| {
            now.checked_add(millis).ok_or_else(|| {
                Error::from(ValidationError::InvalidDuration(format!(
                    "lock of {millis} ms overflows"
                )))
            })
        })
        .transpose()
}

#[async_trait]
impl LockStateRepository for SqliteLockStateRepository {
    async fn is_locked(&self, identifier: &Identifier) -> Result<bool, Error> {
        let now = Utc::now().timestamp_millis();

        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM lockout_locks
                WHERE identifier = ? AND (expires_at IS NULL OR expires_at > ?)
            )
            "#,
        )
        .bind(identifier.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to check lock"))
    }

    async fn get(&self, identifier: &Identifier) -> Result<Option<LockRecord>, Error> {
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query_as::<_, SqliteLockRecord>(
            r#"
            SELECT identifier, locked_at, origin, reason
            FROM lockout_locks
            WHERE identifier = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(identifier.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to get lock"))?;

        row.map(LockRecord::try_from).transpose()
    }

    async fn lock(&self, record: &LockRecord, duration: LockDuration) -> Result<(), Error> {
        let now = Utc::now().timestamp_millis();
        let expires_at = expires_at(duration, now)?;

        sqlx::query(
            r#"
            INSERT INTO lockout_locks (identifier, locked_at, origin, reason, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                locked_at = excluded.locked_at,
                origin = excluded.origin,
                reason = excluded.reason,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(record.identifier.as_str())
        .bind(record.locked_at.timestamp_millis())
        .bind(record.origin.as_str())
        .bind(record.reason.as_deref())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to set lock"))?;

        Ok(())
    }

    async fn try_lock(&self, record: &LockRecord, duration: LockDuration) -> Result<bool, Error> {
        let now = Utc::now().timestamp_millis();
        let expires_at = expires_at(duration, now)?;

        // Replaces the row only when it holds an expired lock
        let result = sqlx::query(
            r#"
            INSERT INTO lockout_locks (identifier, locked_at, origin, reason, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(identifier) DO UPDATE SET
                locked_at = excluded.locked_at,
                origin = excluded.origin,
                reason = excluded.reason,
                expires_at = excluded.expires_at
            WHERE lockout_locks.expires_at IS NOT NULL AND lockout_locks.expires_at <= ?
            "#,
        )
        .bind(record.identifier.as_str())
        .bind(record.locked_at.timestamp_millis())
        .bind(record.origin.as_str())
        .bind(record.reason.as_deref())
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to set lock"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlock(&self, identifier: &Identifier) -> Result<bool, Error> {
        let now = Utc::now().timestamp_millis();

        let deleted: Option<Option<i64>> =
            sqlx::query_scalar("DELETE FROM lockout_locks WHERE identifier = ? RETURNING expires_at")
                .bind(identifier.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_err(e, "Failed to remove lock"))?;

        Ok(deleted.is_some_and(|expires_at| expires_at.is_none_or(|t| t > now)))
    }

    async fn remaining(&self, identifier: &Identifier) -> Result<Option<LockExpiry>, Error> {
        let now = Utc::now().timestamp_millis();

        let row: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            SELECT expires_at FROM lockout_locks
            WHERE identifier = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(identifier.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_err(e, "Failed to get lock expiry"))?;

        Ok(row.map(|expires_at| match expires_at {
            Some(t) => LockExpiry::In(Duration::milliseconds(t - now)),
            None => LockExpiry::Never,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::tests::setup_test_db;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_lock_and_get() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);
        let user = id("test@example.com");

        assert!(!repo.is_locked(&user).await.unwrap());
        assert!(repo.get(&user).await.unwrap().is_none());

        let record = LockRecord::administrative(user.clone(), Some("fraud review".to_string()));
        repo.lock(&record, LockDuration::Indefinite).await.unwrap();

        assert!(repo.is_locked(&user).await.unwrap());
        let stored = repo.get(&user).await.unwrap().expect("lock should exist");
        assert_eq!(stored.origin, LockOrigin::Administrative);
        assert_eq!(stored.reason.as_deref(), Some("fraud review"));
        assert_eq!(
            stored.locked_at.timestamp_millis(),
            record.locked_at.timestamp_millis()
        );
        assert_eq!(
            repo.remaining(&user).await.unwrap(),
            Some(LockExpiry::Never)
        );
    }

    #[tokio::test]
    async fn test_timed_lock_remaining() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);
        let user = id("test@example.com");

        repo.lock(&LockRecord::automatic(user.clone()), LockDuration::from_secs(1800).unwrap())
            .await
            .unwrap();

        let remaining = repo.remaining(&user).await.unwrap().unwrap().as_secs();
        assert!(remaining > 1790 && remaining <= 1800);
    }

    #[tokio::test]
    async fn test_try_lock_does_not_replace_active_lock() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);
        let user = id("test@example.com");

        repo.lock(
            &LockRecord::administrative(user.clone(), None),
            LockDuration::Indefinite,
        )
        .await
        .unwrap();

        let created = repo
            .try_lock(&LockRecord::automatic(user.clone()), LockDuration::from_secs(60).unwrap())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(
            repo.get(&user).await.unwrap().unwrap().origin,
            LockOrigin::Administrative
        );
    }

    #[tokio::test]
    async fn test_lock_expires_and_can_be_replaced() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);
        let user = id("test@example.com");
        let record = LockRecord::automatic(user.clone());

        let short = LockDuration::Timed(Duration::milliseconds(50));
        assert!(repo.try_lock(&record, short).await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!repo.is_locked(&user).await.unwrap());
        assert!(repo.remaining(&user).await.unwrap().is_none());

        assert!(
            repo.try_lock(&record, LockDuration::from_secs(60).unwrap())
                .await
                .unwrap()
        );
        assert!(repo.is_locked(&user).await.unwrap());
    }

    #[tokio::test]
    async fn test_overflowing_lock_is_rejected() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);
        let user = id("test@example.com");
        let record = LockRecord::automatic(user.clone());

        let err = repo
            .try_lock(&record, LockDuration::Timed(Duration::MAX))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());
        let err = repo
            .lock(&record, LockDuration::Timed(Duration::MAX))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        assert!(!repo.is_locked(&user).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);
        let user = id("test@example.com");

        assert!(!repo.unlock(&user).await.unwrap());

        repo.lock(&LockRecord::automatic(user.clone()), LockDuration::from_secs(60).unwrap())
            .await
            .unwrap();
        assert!(repo.unlock(&user).await.unwrap());
        assert!(!repo.is_locked(&user).await.unwrap());
        assert!(!repo.unlock(&user).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_keeps_active_locks() {
        let repo = SqliteLockStateRepository::new(setup_test_db().await);

        repo.lock(
            &LockRecord::automatic(id("expired@example.com")),
            LockDuration::Timed(Duration::milliseconds(10)),
        )
        .await
        .unwrap();
        repo.lock(
            &LockRecord::administrative(id("held@example.com"), None),
            LockDuration::Indefinite,
        )
        .await
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(repo.purge_expired().await.unwrap(), 1);
        assert!(repo.is_locked(&id("held@example.com")).await.unwrap());
    }
}
