//! Redis storage backend for bulwark.
//!
//! This is the backend for deployments with more than one application
//! instance: every instance talks to the same Redis and sees the same
//! counters and locks. Expiry is left to Redis key TTLs.
//!
//! Keys follow [`KeyLayout`]: `{prefix}:attempts:{identifier}` holds an
//! integer counter and `{prefix}:lock:{identifier}` a JSON lock record.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulwark_core::KeyLayout;
//! use bulwark_storage_redis::RedisStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = RedisStorage::connect("redis://127.0.0.1:6379")
//!     .await?
//!     .with_keys(KeyLayout::new("myapp"))
//!     .into_repository_provider();
//! # Ok(())
//! # }
//! ```
pub mod connection;
pub mod repositories;

use std::time::Duration;

use async_trait::async_trait;
use bulwark_core::{
    Error, KeyLayout,
    error::StorageError,
    repositories::{
        AttemptCounterRepositoryProvider, LockStateRepositoryProvider, RepositoryProvider,
    },
};
use redis::Client;
use redis::aio::ConnectionManager;

pub use connection::{DEFAULT_COMMAND_TIMEOUT, RedisConnection};
pub use repositories::{RedisAttemptCounterRepository, RedisLockStateRepository};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A managed Redis connection and the key layout to use with it.
pub struct RedisStorage {
    conn: RedisConnection,
    keys: KeyLayout,
}

impl RedisStorage {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = Client::open(url).map_err(|e| {
            Error::Storage(StorageError::Connection(format!(
                "Invalid Redis URL '{url}': {e}"
            )))
        })?;

        let manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                tracing::error!(url, "Timed out connecting to Redis");
                Error::Storage(StorageError::Timeout(format!(
                    "Redis connection timed out after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                )))
            })?
            .map_err(|e| connection::map_redis_err(e, "Failed to connect to Redis"))?;

        tracing::debug!(url, "Connected to Redis");

        Ok(Self {
            conn: RedisConnection::new(manager, DEFAULT_COMMAND_TIMEOUT),
            keys: KeyLayout::default(),
        })
    }

    /// Use a different key prefix.
    pub fn with_keys(mut self, keys: KeyLayout) -> Self {
        self.keys = keys;
        self
    }

    /// Allow each command this long before reporting a timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.conn = RedisConnection::new(self.conn.manager(), timeout);
        self
    }

    pub fn into_repository_provider(self) -> RedisRepositoryProvider {
        RedisRepositoryProvider::new(self.conn, self.keys)
    }
}

/// Repository provider implementation for Redis
pub struct RedisRepositoryProvider {
    conn: RedisConnection,
    attempts: RedisAttemptCounterRepository,
    locks: RedisLockStateRepository,
}

impl RedisRepositoryProvider {
    pub fn new(conn: RedisConnection, keys: KeyLayout) -> Self {
        Self {
            attempts: RedisAttemptCounterRepository::new(conn.clone(), keys.clone()),
            locks: RedisLockStateRepository::new(conn.clone(), keys),
            conn,
        }
    }
}

impl AttemptCounterRepositoryProvider for RedisRepositoryProvider {
    type AttemptCounterRepo = RedisAttemptCounterRepository;

    fn attempts(&self) -> &Self::AttemptCounterRepo {
        &self.attempts
    }
}

impl LockStateRepositoryProvider for RedisRepositoryProvider {
    type LockStateRepo = RedisLockStateRepository;

    fn locks(&self) -> &Self::LockStateRepo {
        &self.locks
    }
}

#[async_trait]
impl RepositoryProvider for RedisRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        let _: String = self
            .conn
            .query(&redis::cmd("PING"), "Health check failed")
            .await?;
        Ok(())
    }
}
