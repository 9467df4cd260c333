//! Builder pattern for constructing Bulwark instances
//!
//! This module provides a type-safe builder for creating [`Bulwark`] instances
//! with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulwark::{BulwarkBuilder, FailureMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let bulwark = BulwarkBuilder::new()
//!         .with_failure_mode(FailureMode::FailClosed)
//!         .with_sqlite("sqlite://lockout.db")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use bulwark_core::{
    EventBus, EventHandler, FailureMode, LockoutConfig, LockoutPolicy, RepositoryProvider,
};

use crate::Bulwark;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Bulwark instance.
#[derive(Debug, thiserror::Error)]
pub enum BulwarkBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`BulwarkBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Bulwark`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build
///
/// Configuration methods are available in both states. The Redis key prefix
/// is read from the configuration when [`with_redis`](BulwarkBuilder::with_redis)
/// is called, so set the configuration first.
pub struct BulwarkBuilder<Storage> {
    storage: Storage,
    config: LockoutConfig,
    event_handlers: Vec<Arc<dyn EventHandler>>,
    apply_migrations: bool,
}

impl Default for BulwarkBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl BulwarkBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Lockout: enabled, 5 attempts in 15 minutes, 30 minute lock
    /// - Failure mode: fail open
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: LockoutConfig::default(),
            event_handlers: Vec::new(),
            apply_migrations: false,
        }
    }

    /// Use any repository provider, including a custom one.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> BulwarkBuilder<WithStorage<R>> {
        BulwarkBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            event_handlers: self.event_handlers,
            apply_migrations: self.apply_migrations,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "memory")]
impl BulwarkBuilder<NoStorage> {
    /// Keep lockout state in process memory.
    ///
    /// Only suitable for a single instance; state is lost on restart.
    pub fn with_memory(
        self,
    ) -> BulwarkBuilder<WithStorage<bulwark_storage_memory::MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(
            bulwark_storage_memory::MemoryRepositoryProvider::new(),
        ))
    }
}

#[cfg(feature = "sqlite")]
impl BulwarkBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        BulwarkBuilder<WithStorage<bulwark_storage_sqlite::SqliteRepositoryProvider>>,
        BulwarkBuilderError,
    > {
        let storage = bulwark_storage_sqlite::SqliteStorage::connect(url)
            .await
            .map_err(|e| BulwarkBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(storage.into_repository_provider())))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> BulwarkBuilder<WithStorage<bulwark_storage_sqlite::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(
            bulwark_storage_sqlite::SqliteRepositoryProvider::new(pool),
        ))
    }
}

#[cfg(feature = "redis")]
impl BulwarkBuilder<NoStorage> {
    /// Configure Redis storage by connecting to the given URL.
    ///
    /// Keys are namespaced with the configured key prefix.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn with_redis(
        self,
        url: &str,
    ) -> Result<
        BulwarkBuilder<WithStorage<bulwark_storage_redis::RedisRepositoryProvider>>,
        BulwarkBuilderError,
    > {
        let keys = bulwark_core::KeyLayout::new(self.config.key_prefix.clone());
        let storage = bulwark_storage_redis::RedisStorage::connect(url)
            .await
            .map_err(|e| BulwarkBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(
            storage.with_keys(keys).into_repository_provider(),
        )))
    }
}

// ============================================================================
// Configuration Methods
// ============================================================================

impl<S> BulwarkBuilder<S> {
    /// Replace the whole lockout configuration.
    pub fn with_config(mut self, config: LockoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the thresholds and durations.
    ///
    /// Default: 5 attempts in 15 minutes, 30 minute lock
    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Set what the lock gate answers while the store is unavailable.
    ///
    /// Default: [`FailureMode::FailOpen`]
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.config.failure_mode = failure_mode;
        self
    }

    /// Turn failed attempt counting on or off.
    ///
    /// Lock queries and administrative operations keep working when off.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Read the configuration from `BULWARK_*` environment variables.
    ///
    /// See [`LockoutConfig::from_env`] for the variables read.
    pub fn with_config_from_env(mut self) -> Result<Self, BulwarkBuilderError> {
        self.config = LockoutConfig::from_env()
            .map_err(|e| BulwarkBuilderError::InvalidConfiguration(e.to_string()))?;
        Ok(self)
    }

    /// Register a handler for security events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handlers.push(handler);
        self
    }
}

impl<R: RepositoryProvider> BulwarkBuilder<WithStorage<R>> {
    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Bulwark instance.
    ///
    /// If `apply_migrations(true)` was called, migrations will be applied
    /// before returning.
    pub async fn build(self) -> Result<Bulwark<R>, BulwarkBuilderError> {
        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| BulwarkBuilderError::Migration(e.to_string()))?;
        }

        let events = EventBus::new();
        for handler in self.event_handlers {
            events.register(handler).await;
        }

        Ok(Bulwark::from_parts(
            self.storage.repositories,
            self.config,
            events,
        ))
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_defaults() {
        let bulwark = BulwarkBuilder::new().with_memory().build().await.unwrap();

        assert!(bulwark.config().enabled);
        assert_eq!(bulwark.config().policy, LockoutPolicy::default());
        assert_eq!(bulwark.config().failure_mode, FailureMode::FailOpen);
    }

    #[tokio::test]
    async fn test_builder_configuration_in_either_state() {
        let policy = LockoutPolicy::from_secs(3, 60, 120).unwrap();

        let bulwark = BulwarkBuilder::new()
            .with_policy(policy)
            .with_memory()
            .with_failure_mode(FailureMode::FailClosed)
            .enabled(false)
            .build()
            .await
            .unwrap();

        assert_eq!(bulwark.config().policy, policy);
        assert_eq!(bulwark.config().failure_mode, FailureMode::FailClosed);
        assert!(!bulwark.config().enabled);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_builder_sqlite_with_migrations() {
        let bulwark = BulwarkBuilder::new()
            .with_sqlite("sqlite::memory:")
            .await
            .unwrap()
            .apply_migrations(true)
            .build()
            .await
            .unwrap();

        bulwark.health_check().await.unwrap();
        assert_eq!(bulwark.record_login_failure("a@b.com").await.unwrap(), 1);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_builder_sqlite_unreachable_path() {
        let result = BulwarkBuilder::new()
            .with_sqlite("sqlite:///nonexistent-bulwark-dir/nested/lockout.db")
            .await;
        assert!(matches!(
            result,
            Err(BulwarkBuilderError::StorageConnection(_))
        ));
    }
}
