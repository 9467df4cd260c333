//! Repository traits for the data access layer
//!
//! This module defines the repository interfaces that the lockout service uses
//! to interact with the shared store.
//!
//! # Trait Hierarchy
//!
//! - [`AttemptCounterRepository`] and [`LockStateRepository`] define the
//!   operations for each key family
//! - The matching `*RepositoryProvider` traits give access to each repository
//! - [`RepositoryProvider`] combines both providers plus lifecycle methods
//!
//! Storage backends implement the individual repositories and expose them
//! through one provider. Services receive the repositories through the
//! adapters in [`adapter`], which hold an `Arc` of the provider.

pub mod adapter;
pub mod attempt_counter;
pub mod lock_state;

pub use adapter::{AttemptCounterRepositoryAdapter, LockStateRepositoryAdapter};
pub use attempt_counter::AttemptCounterRepository;
pub use lock_state::LockStateRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for attempt counter repository access.
pub trait AttemptCounterRepositoryProvider: Send + Sync + 'static {
    /// The attempt counter repository implementation type
    type AttemptCounterRepo: AttemptCounterRepository;

    /// Get the attempt counter repository
    fn attempts(&self) -> &Self::AttemptCounterRepo;
}

/// Provider trait for lock state repository access.
pub trait LockStateRepositoryProvider: Send + Sync + 'static {
    /// The lock state repository implementation type
    type LockStateRepo: LockStateRepository;

    /// Get the lock state repository
    fn locks(&self) -> &Self::LockStateRepo;
}

/// Provider trait that storage implementations must implement.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement [`AttemptCounterRepository`] and [`LockStateRepository`]
/// 2. Implement both `*RepositoryProvider` traits
/// 3. Implement this trait with `migrate()` and `health_check()`, and
///    `purge_expired()` if the store has no native expiry
///
/// ```rust,ignore
/// use bulwark_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl AttemptCounterRepositoryProvider for MyStorage {
///     type AttemptCounterRepo = MyAttemptCounter;
///     fn attempts(&self) -> &Self::AttemptCounterRepo { &self.attempts }
/// }
///
/// // ... LockStateRepositoryProvider ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { Ok(()) }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider:
    AttemptCounterRepositoryProvider + LockStateRepositoryProvider
{
    /// Prepare the store (create tables, load scripts)
    async fn migrate(&self) -> Result<(), Error>;

    /// Check that the store is reachable
    async fn health_check(&self) -> Result<(), Error>;

    /// Delete records whose time-to-live has passed.
    ///
    /// Stores with native key expiry have nothing to do here.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn purge_expired(&self) -> Result<u64, Error> {
        Ok(0)
    }
}
