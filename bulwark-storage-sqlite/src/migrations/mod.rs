//! Schema migrations for the SQLite backend.
//!
//! Applied migrations are recorded in `bulwark_migrations`; each pending
//! migration runs in its own transaction together with its record.

use chrono::Utc;
use sqlx::SqlitePool;

pub const MIGRATION_TABLE: &str = "bulwark_migrations";

/// A forward-only schema change.
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static [&'static str],
}

pub const MIGRATIONS: &[SqliteMigration] = &[
    SqliteMigration {
        version: 1,
        name: "CreateLockoutAttemptsTable",
        up: &[r#"
            CREATE TABLE IF NOT EXISTS lockout_attempts (
                identifier TEXT PRIMARY KEY,
                count INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );"#],
    },
    SqliteMigration {
        version: 2,
        name: "CreateLockoutLocksTable",
        up: &[r#"
            CREATE TABLE IF NOT EXISTS lockout_locks (
                identifier TEXT PRIMARY KEY,
                locked_at INTEGER NOT NULL,
                origin TEXT NOT NULL,
                reason TEXT,
                expires_at INTEGER
            );"#],
    },
    SqliteMigration {
        version: 3,
        name: "CreateExpiryIndexes",
        up: &[
            "CREATE INDEX IF NOT EXISTS idx_lockout_attempts_expires_at ON lockout_attempts(expires_at);",
            "CREATE INDEX IF NOT EXISTS idx_lockout_locks_expires_at ON lockout_locks(expires_at);",
        ],
    },
];

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the migration table if it does not exist.
    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            );"#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Apply every migration that has not been applied yet, in order.
    ///
    /// # Returns
    ///
    /// The number of migrations applied by this call.
    pub async fn up(&self, migrations: &[SqliteMigration]) -> Result<usize, sqlx::Error> {
        let mut applied = 0;

        for migration in migrations {
            if self.is_applied(migration.version).await? {
                continue;
            }

            let mut tx = self.pool.begin().await?;

            tracing::info!(
                "Applying migration {} ({})",
                migration.name,
                migration.version
            );

            for statement in migration.up {
                sqlx::query(statement).execute(&mut *tx).await?;
            }

            sqlx::query(&format!(
                "INSERT INTO {MIGRATION_TABLE} (version, name, applied_at) VALUES (?, ?, ?)"
            ))
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            applied += 1;
        }

        Ok(applied)
    }

    pub async fn applied_versions(&self) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT version FROM {MIGRATION_TABLE} ORDER BY version"
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn is_applied(&self, version: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {MIGRATION_TABLE} WHERE version = ?)"
        ))
        .bind(version)
        .fetch_one(&self.pool)
        .await
    }
}
