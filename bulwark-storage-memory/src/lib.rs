//! In-process storage backend for bulwark.
//!
//! State lives in the memory of one process, so this backend only suits a
//! single-instance deployment, development and tests. Deployments with more
//! than one instance need a shared store such as Redis.
//!
//! Expiry is tracked against [`tokio::time::Instant`], which lets tests drive
//! time-to-lives with a paused runtime clock.
//!
//! # Example
//!
//! ```rust,ignore
//! use bulwark_storage_memory::MemoryRepositoryProvider;
//!
//! let provider = MemoryRepositoryProvider::new();
//! ```
pub mod repositories;

use async_trait::async_trait;
use bulwark_core::{
    Error,
    repositories::{
        AttemptCounterRepositoryProvider, LockStateRepositoryProvider, RepositoryProvider,
    },
};

pub use repositories::{MemoryAttemptCounterRepository, MemoryLockStateRepository};

/// Repository provider implementation backed by process memory
#[derive(Debug, Default)]
pub struct MemoryRepositoryProvider {
    attempts: MemoryAttemptCounterRepository,
    locks: MemoryLockStateRepository,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptCounterRepositoryProvider for MemoryRepositoryProvider {
    type AttemptCounterRepo = MemoryAttemptCounterRepository;

    fn attempts(&self) -> &Self::AttemptCounterRepo {
        &self.attempts
    }
}

impl LockStateRepositoryProvider for MemoryRepositoryProvider {
    type LockStateRepo = MemoryLockStateRepository;

    fn locks(&self) -> &Self::LockStateRepo {
        &self.locks
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let purged = self.attempts.purge_expired() + self.locks.purge_expired();
        tracing::debug!(purged, "Purged expired in-memory lockout records");
        Ok(purged)
    }
}
