use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    Error, Identifier,
    repositories::{AttemptCounterRepository, LockStateRepository, RepositoryProvider},
    storage::{LockDuration, LockExpiry, LockRecord},
};

/// Adapter that wraps a RepositoryProvider and implements [`AttemptCounterRepository`]
pub struct AttemptCounterRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptCounterRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AttemptCounterRepository for AttemptCounterRepositoryAdapter<R> {
    async fn increment(
        &self,
        identifier: &Identifier,
        window: Duration,
        ceiling: u32,
    ) -> Result<u32, Error> {
        self.provider
            .attempts()
            .increment(identifier, window, ceiling)
            .await
    }

    async fn get(&self, identifier: &Identifier) -> Result<u32, Error> {
        self.provider.attempts().get(identifier).await
    }

    async fn clear(&self, identifier: &Identifier) -> Result<(), Error> {
        self.provider.attempts().clear(identifier).await
    }
}

/// Adapter that wraps a RepositoryProvider and implements [`LockStateRepository`]
pub struct LockStateRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LockStateRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LockStateRepository for LockStateRepositoryAdapter<R> {
    async fn is_locked(&self, identifier: &Identifier) -> Result<bool, Error> {
        self.provider.locks().is_locked(identifier).await
    }

    async fn get(&self, identifier: &Identifier) -> Result<Option<LockRecord>, Error> {
        self.provider.locks().get(identifier).await
    }

    async fn lock(&self, record: &LockRecord, duration: LockDuration) -> Result<(), Error> {
        self.provider.locks().lock(record, duration).await
    }

    async fn try_lock(&self, record: &LockRecord, duration: LockDuration) -> Result<bool, Error> {
        self.provider.locks().try_lock(record, duration).await
    }

    async fn unlock(&self, identifier: &Identifier) -> Result<bool, Error> {
        self.provider.locks().unlock(identifier).await
    }

    async fn remaining(&self, identifier: &Identifier) -> Result<Option<LockExpiry>, Error> {
        self.provider.locks().remaining(identifier).await
    }
}
