//! In-memory implementation of the lock state repository.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use bulwark_core::{
    Error, Identifier,
    error::ValidationError,
    repositories::LockStateRepository,
    storage::{LockDuration, LockExpiry, LockRecord},
};
use chrono::Duration;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct LockEntry {
    record: LockRecord,
    /// `None` for an indefinite lock
    expires_at: Option<Instant>,
}

impl LockEntry {
    fn new(record: &LockRecord, duration: LockDuration, now: Instant) -> Result<Self, Error> {
        let expires_at = match duration.ttl_millis() {
            Some(millis) => Some(
                now.checked_add(StdDuration::from_millis(millis as u64))
                    .ok_or_else(|| {
                        ValidationError::InvalidDuration(format!(
                            "lock of {millis} ms runs past the clock range"
                        ))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            record: record.clone(),
            expires_at,
        })
    }

    fn is_active(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Lock markers held in a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryLockStateRepository {
    locks: DashMap<Identifier, LockEntry>,
}

impl MemoryLockStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop lock markers whose time-to-live has passed.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut purged = 0;
        self.locks.retain(|_, entry| {
            let keep = entry.is_active(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }
}

#[async_trait]
impl LockStateRepository for MemoryLockStateRepository {
    async fn is_locked(&self, identifier: &Identifier) -> Result<bool, Error> {
        let now = Instant::now();
        Ok(self
            .locks
            .get(identifier)
            .is_some_and(|entry| entry.is_active(now)))
    }

    async fn get(&self, identifier: &Identifier) -> Result<Option<LockRecord>, Error> {
        let now = Instant::now();
        Ok(self
            .locks
            .get(identifier)
            .filter(|entry| entry.is_active(now))
            .map(|entry| entry.record.clone()))
    }

    async fn lock(&self, record: &LockRecord, duration: LockDuration) -> Result<(), Error> {
        let entry = LockEntry::new(record, duration, Instant::now())?;
        self.locks.insert(record.identifier.clone(), entry);
        Ok(())
    }

    async fn try_lock(&self, record: &LockRecord, duration: LockDuration) -> Result<bool, Error> {
        let now = Instant::now();
        let entry = LockEntry::new(record, duration, now)?;

        match self.locks.entry(record.identifier.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_active(now) {
                    return Ok(false);
                }
                occupied.insert(entry);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    async fn unlock(&self, identifier: &Identifier) -> Result<bool, Error> {
        let now = Instant::now();
        Ok(self
            .locks
            .remove(identifier)
            .is_some_and(|(_, entry)| entry.is_active(now)))
    }

    async fn remaining(&self, identifier: &Identifier) -> Result<Option<LockExpiry>, Error> {
        let now = Instant::now();
        Ok(self
            .locks
            .get(identifier)
            .filter(|entry| entry.is_active(now))
            .map(|entry| match entry.expires_at {
                Some(expires_at) => LockExpiry::In(
                    Duration::from_std(expires_at.saturating_duration_since(now))
                        .unwrap_or_else(|_| Duration::zero()),
                ),
                None => LockExpiry::Never,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let repo = MemoryLockStateRepository::new();
        let user = id("test@example.com");

        assert!(!repo.is_locked(&user).await.unwrap());
        assert!(repo.get(&user).await.unwrap().is_none());
        assert!(repo.remaining(&user).await.unwrap().is_none());

        let record = LockRecord::administrative(user.clone(), Some("review".to_string()));
        repo.lock(&record, LockDuration::from_secs(300).unwrap()).await.unwrap();

        assert!(repo.is_locked(&user).await.unwrap());
        assert_eq!(repo.get(&user).await.unwrap(), Some(record));

        assert!(repo.unlock(&user).await.unwrap());
        assert!(!repo.is_locked(&user).await.unwrap());
        assert!(!repo.unlock(&user).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_lock_only_once() {
        let repo = MemoryLockStateRepository::new();
        let record = LockRecord::automatic(id("test@example.com"));

        assert!(
            repo.try_lock(&record, LockDuration::from_secs(60).unwrap())
                .await
                .unwrap()
        );
        assert!(
            !repo
                .try_lock(&record, LockDuration::from_secs(60).unwrap())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_indefinite_lock_has_no_expiry() {
        let repo = MemoryLockStateRepository::new();
        let user = id("test@example.com");
        let record = LockRecord::administrative(user.clone(), None);

        repo.lock(&record, LockDuration::Indefinite).await.unwrap();
        assert_eq!(
            repo.remaining(&user).await.unwrap(),
            Some(LockExpiry::Never)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_lock_expires() {
        let repo = MemoryLockStateRepository::new();
        let user = id("test@example.com");
        let record = LockRecord::automatic(user.clone());

        repo.lock(&record, LockDuration::from_secs(60).unwrap()).await.unwrap();

        tokio::time::advance(StdDuration::from_secs(20)).await;
        assert_eq!(
            repo.remaining(&user).await.unwrap().map(|e| e.as_secs()),
            Some(40)
        );

        tokio::time::advance(StdDuration::from_secs(41)).await;
        assert!(!repo.is_locked(&user).await.unwrap());
        assert!(repo.remaining(&user).await.unwrap().is_none());
        assert!(!repo.unlock(&user).await.unwrap(), "expired lock is not active");

        assert!(
            repo.try_lock(&record, LockDuration::from_secs(60).unwrap())
                .await
                .unwrap(),
            "expired marker may be replaced"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_overwrite_replaces_expiry() {
        let repo = MemoryLockStateRepository::new();
        let user = id("test@example.com");

        repo.lock(&LockRecord::automatic(user.clone()), LockDuration::from_secs(60).unwrap())
            .await
            .unwrap();
        repo.lock(
            &LockRecord::administrative(user.clone(), None),
            LockDuration::Indefinite,
        )
        .await
        .unwrap();

        tokio::time::advance(StdDuration::from_secs(3600)).await;
        assert!(repo.is_locked(&user).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_keeps_indefinite_locks() {
        let repo = MemoryLockStateRepository::new();

        repo.lock(
            &LockRecord::automatic(id("timed@example.com")),
            LockDuration::from_secs(10).unwrap(),
        )
        .await
        .unwrap();
        repo.lock(
            &LockRecord::administrative(id("held@example.com"), None),
            LockDuration::Indefinite,
        )
        .await
        .unwrap();

        tokio::time::advance(StdDuration::from_secs(11)).await;
        assert_eq!(repo.purge_expired(), 1);
        assert!(repo.is_locked(&id("held@example.com")).await.unwrap());
    }
}
