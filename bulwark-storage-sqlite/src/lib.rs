//! SQLite storage backend for bulwark.
//!
//! Counters and lock markers are rows with an absolute expiry. Rows past
//! their expiry read as absent; [`RepositoryProvider::purge_expired`]
//! deletes them.
//!
//! A SQLite file is shared by the processes on one host. Deployments spread
//! across hosts need the Redis backend.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulwark_core::RepositoryProvider;
//! use bulwark_storage_sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = SqliteStorage::connect("sqlite://lockout.db")
//!     .await?
//!     .into_repository_provider();
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```
pub mod migrations;
pub mod repositories;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bulwark_core::{
    Error,
    error::StorageError,
    repositories::{
        AttemptCounterRepositoryProvider, LockStateRepositoryProvider, RepositoryProvider,
    },
};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::migrations::{MIGRATIONS, SqliteMigrationManager};
pub use repositories::{SqliteAttemptCounterRepository, SqliteLockStateRepository};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite connection pool configured for the lockout tables.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `url`, creating the file if needed.
    ///
    /// An in-memory database is held on a single connection so that every
    /// query sees the same data.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(DEFAULT_MAX_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_repository_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    attempts: SqliteAttemptCounterRepository,
    locks: SqliteLockStateRepository,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            attempts: SqliteAttemptCounterRepository::new(pool.clone()),
            locks: SqliteLockStateRepository::new(pool.clone()),
            pool,
        }
    }
}

impl AttemptCounterRepositoryProvider for SqliteRepositoryProvider {
    type AttemptCounterRepo = SqliteAttemptCounterRepository;

    fn attempts(&self) -> &Self::AttemptCounterRepo {
        &self.attempts
    }
}

impl LockStateRepositoryProvider for SqliteRepositoryProvider {
    type LockStateRepo = SqliteLockStateRepository;

    fn locks(&self) -> &Self::LockStateRepo {
        &self.locks
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(MIGRATIONS).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| repositories::map_sqlx_err(e, "Health check failed"))?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let attempts = self.attempts.purge_expired().await?;
        let locks = self.locks.purge_expired().await?;
        Ok(attempts + locks)
    }
}
