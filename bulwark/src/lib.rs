//! # Bulwark
//!
//! Bulwark protects login endpoints against brute force and credential
//! stuffing by counting failed attempts per account identifier and locking
//! the account once a threshold is reached within a time window.
//!
//! All state lives in a shared store, so every instance of a horizontally
//! scaled service enforces the same counters and locks:
//! - Counters expire on their own after the attempt window
//! - Automatic locks expire after the lock duration
//! - Administrative locks can be indefinite and are removed explicitly
//!
//! ## Storage Support
//!
//! - In-memory (single process, development and tests)
//! - SQLite (processes on one host)
//! - Redis (any number of hosts)
//!
//! ## Example
//!
//! ```rust,no_run
//! use bulwark::BulwarkBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bulwark = BulwarkBuilder::new().with_memory().build().await?;
//!
//!     if bulwark.is_account_locked("user@example.com").await? {
//!         // Reject without verifying credentials
//!         return Ok(());
//!     }
//!
//!     let verified = false; // verify the password here
//!     if verified {
//!         bulwark.record_login_success("user@example.com").await?;
//!     } else {
//!         bulwark.record_login_failure("user@example.com").await?;
//!     }
//!     Ok(())
//! }
//! ```
pub mod builder;

use std::sync::Arc;

use bulwark_core::{
    repositories::{AttemptCounterRepositoryAdapter, LockStateRepositoryAdapter},
    services::LockoutService,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use builder::{BulwarkBuilder, BulwarkBuilderError, NoStorage, WithStorage};

/// Re-export core types from bulwark_core
pub use bulwark_core::{
    EventBus, EventHandler, FailureMode, Identifier, KeyLayout, LockDuration, LockExpiry,
    LockOrigin, LockRecord, LockoutConfig, LockoutEvent, LockoutPolicy, LockoutState,
    LockoutStatus, RepositoryProvider,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "memory")]
pub use bulwark_storage_memory::MemoryRepositoryProvider;

#[cfg(feature = "sqlite")]
pub use bulwark_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

#[cfg(feature = "redis")]
pub use bulwark_storage_redis::{RedisRepositoryProvider, RedisStorage};

/// How often expired records are purged by [`Bulwark::start_cleanup_task`].
pub const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Errors that can occur when using Bulwark.
#[derive(Debug, thiserror::Error)]
pub enum BulwarkError {
    /// The identifier or configuration was rejected before touching the store
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// The store could not be reached or did not answer in time
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// The store answered with an error
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl BulwarkError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, BulwarkError::StoreUnavailable(_))
    }
}

impl From<bulwark_core::Error> for BulwarkError {
    fn from(error: bulwark_core::Error) -> Self {
        if error.is_validation_error() {
            BulwarkError::ValidationError(error.to_string())
        } else if error.is_store_unavailable() {
            BulwarkError::StoreUnavailable(error.to_string())
        } else {
            BulwarkError::StorageError(error.to_string())
        }
    }
}

type Lockout<R> =
    LockoutService<AttemptCounterRepositoryAdapter<R>, LockStateRepositoryAdapter<R>>;

/// The account lockout engine bound to a storage backend.
///
/// Cheap to share behind an `Arc`; holds no per-identifier state of its own.
pub struct Bulwark<R: RepositoryProvider> {
    repositories: Arc<R>,
    lockout_service: Arc<Lockout<R>>,
    events: EventBus,
}

impl<R: RepositoryProvider> Bulwark<R> {
    /// Create an engine with the default configuration.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::from_parts(repositories, LockoutConfig::default(), EventBus::new())
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        config: LockoutConfig,
        events: EventBus,
    ) -> Self {
        let lockout_service = Arc::new(
            LockoutService::new(
                Arc::new(AttemptCounterRepositoryAdapter::new(repositories.clone())),
                Arc::new(LockStateRepositoryAdapter::new(repositories.clone())),
                config,
            )
            .with_event_bus(events.clone()),
        );

        Self {
            repositories,
            lockout_service,
            events,
        }
    }

    /// Replace the configuration, keeping storage and event handlers.
    pub fn with_lockout_config(self, config: LockoutConfig) -> Self {
        Self::from_parts(self.repositories, config, self.events)
    }

    pub fn config(&self) -> &LockoutConfig {
        self.lockout_service.config()
    }

    /// Register a handler for security events.
    pub async fn register_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.events.register(handler).await;
    }

    pub async fn migrate(&self) -> Result<(), BulwarkError> {
        self.repositories.migrate().await.map_err(BulwarkError::from)
    }

    pub async fn health_check(&self) -> Result<(), BulwarkError> {
        self.repositories
            .health_check()
            .await
            .map_err(BulwarkError::from)
    }

    /// Delete expired records from stores without native expiry.
    pub async fn purge_expired(&self) -> Result<u64, BulwarkError> {
        self.repositories
            .purge_expired()
            .await
            .map_err(BulwarkError::from)
    }

    /// Check whether the account is locked. Call before verifying credentials.
    ///
    /// While the store is unavailable the answer follows the configured
    /// [`FailureMode`].
    pub async fn is_account_locked(&self, identifier: &str) -> Result<bool, BulwarkError> {
        Ok(self.lockout_service.is_account_locked(identifier).await?)
    }

    pub async fn get_login_attempts(&self, identifier: &str) -> Result<u32, BulwarkError> {
        Ok(self.lockout_service.get_login_attempts(identifier).await?)
    }

    pub async fn get_remaining_attempts(&self, identifier: &str) -> Result<u32, BulwarkError> {
        Ok(self.lockout_service.get_remaining_attempts(identifier).await?)
    }

    /// Seconds left on a timed lock; 0 when unlocked or locked indefinitely.
    pub async fn get_account_lock_remaining_time(
        &self,
        identifier: &str,
    ) -> Result<u64, BulwarkError> {
        Ok(self
            .lockout_service
            .get_account_lock_remaining_time(identifier)
            .await?)
    }

    /// Record a failed login and return the failed attempt count.
    pub async fn record_login_failure(&self, identifier: &str) -> Result<u32, BulwarkError> {
        Ok(self.lockout_service.record_login_failure(identifier).await?)
    }

    pub async fn record_login_success(&self, identifier: &str) -> Result<(), BulwarkError> {
        Ok(self.lockout_service.record_login_success(identifier).await?)
    }

    /// Reset the failed attempt counter without touching any lock.
    pub async fn clear_login_failures(&self, identifier: &str) -> Result<(), BulwarkError> {
        Ok(self.lockout_service.clear_login_failures(identifier).await?)
    }

    /// Lock the account until [`unlock_account`](Self::unlock_account) is called.
    pub async fn lock_account(
        &self,
        identifier: &str,
        reason: Option<&str>,
    ) -> Result<(), BulwarkError> {
        Ok(self.lockout_service.lock_account(identifier, reason).await?)
    }

    pub async fn lock_account_for(
        &self,
        identifier: &str,
        duration: LockDuration,
        reason: Option<&str>,
    ) -> Result<(), BulwarkError> {
        Ok(self
            .lockout_service
            .lock_account_for(identifier, duration, reason)
            .await?)
    }

    /// Remove a lock without touching the failed attempt counter.
    pub async fn unlock_account(&self, identifier: &str) -> Result<(), BulwarkError> {
        Ok(self.lockout_service.unlock_account(identifier).await?)
    }

    pub async fn get_lockout_status(
        &self,
        identifier: &str,
    ) -> Result<LockoutStatus, BulwarkError> {
        Ok(self.lockout_service.get_lockout_status(identifier).await?)
    }

    /// Start a background task that purges expired records every hour.
    ///
    /// The task stops when `shutdown` changes.
    pub fn start_cleanup_task(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.start_cleanup_task_with_interval(CLEANUP_INTERVAL, shutdown)
    }

    pub fn start_cleanup_task_with_interval(
        &self,
        period: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let repositories = Arc::clone(&self.repositories);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match repositories.purge_expired().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count, "Purged expired lockout records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to purge expired lockout records");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down lockout cleanup task");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use bulwark_core::error::{StorageError, ValidationError};
    use std::time::Duration;

    #[test]
    fn test_error_classification() {
        let err = BulwarkError::from(bulwark_core::Error::from(
            ValidationError::InvalidIdentifier("a b".to_string()),
        ));
        assert!(matches!(err, BulwarkError::ValidationError(_)));

        let err = BulwarkError::from(bulwark_core::Error::from(StorageError::Timeout(
            "slow".to_string(),
        )));
        assert!(err.is_store_unavailable());

        let err = BulwarkError::from(bulwark_core::Error::from(StorageError::Corrupt(
            "bad".to_string(),
        )));
        assert!(matches!(err, BulwarkError::StorageError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_purges_and_stops() {
        let bulwark = Bulwark::new(Arc::new(MemoryRepositoryProvider::new()));
        bulwark
            .lock_account_for("a@b.com", LockDuration::from_secs(5).unwrap(), None)
            .await
            .unwrap();
        bulwark.record_login_failure("c@d.com").await.unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle =
            bulwark.start_cleanup_task_with_interval(Duration::from_secs(60), shutdown_rx);

        // Let the first tick run
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(bulwark.purge_expired().await.unwrap(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_with_lockout_config_keeps_state() {
        let bulwark = Bulwark::new(Arc::new(MemoryRepositoryProvider::new()));
        bulwark.record_login_failure("a@b.com").await.unwrap();

        let bulwark = bulwark.with_lockout_config(
            LockoutConfig::default().with_policy(LockoutPolicy::from_secs(2, 900, 1800).unwrap()),
        );
        bulwark.record_login_failure("a@b.com").await.unwrap();

        assert!(bulwark.is_account_locked("a@b.com").await.unwrap());
        assert_eq!(bulwark.config().policy.max_attempts(), 2);
    }
}
