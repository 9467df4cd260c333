//! In-memory implementation of the attempt counter repository.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use bulwark_core::{
    Error, Identifier, error::ValidationError, repositories::AttemptCounterRepository,
};
use chrono::Duration;
use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: u32,
    expires_at: Instant,
}

/// Attempt counters held in a concurrent map.
///
/// Each counter sits behind its map shard's lock for the duration of an
/// increment, which makes the read-modify-write atomic within the process.
#[derive(Debug, Default)]
pub struct MemoryAttemptCounterRepository {
    counters: DashMap<Identifier, CounterEntry>,
}

impl MemoryAttemptCounterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose window has passed.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut purged = 0;
        self.counters.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }
}

fn to_std(duration: Duration) -> StdDuration {
    duration.to_std().unwrap_or_default()
}

#[async_trait]
impl AttemptCounterRepository for MemoryAttemptCounterRepository {
    async fn increment(
        &self,
        identifier: &Identifier,
        window: Duration,
        ceiling: u32,
    ) -> Result<u32, Error> {
        let now = Instant::now();
        let expires_at = now.checked_add(to_std(window)).ok_or_else(|| {
            ValidationError::InvalidDuration(format!(
                "attempt window of {}s runs past the clock range",
                window.num_seconds()
            ))
        })?;

        let mut entry = self
            .counters
            .entry(identifier.clone())
            .or_insert(CounterEntry {
                count: 0,
                expires_at,
            });

        if entry.expires_at <= now {
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1).min(ceiling.max(1));
        entry.expires_at = expires_at;

        Ok(entry.count)
    }

    async fn get(&self, identifier: &Identifier) -> Result<u32, Error> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(identifier)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.count)
            .unwrap_or(0))
    }

    async fn clear(&self, identifier: &Identifier) -> Result<(), Error> {
        self.counters.remove(identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_increment_and_get() {
        let repo = MemoryAttemptCounterRepository::new();
        let user = id("test@example.com");

        assert_eq!(repo.get(&user).await.unwrap(), 0);
        for expected in 1..=3 {
            let count = repo
                .increment(&user, Duration::minutes(15), 5)
                .await
                .unwrap();
            assert_eq!(count, expected);
        }
        assert_eq!(repo.get(&user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_increment_saturates_at_ceiling() {
        let repo = MemoryAttemptCounterRepository::new();
        let user = id("test@example.com");

        for _ in 0..10 {
            repo.increment(&user, Duration::minutes(15), 3)
                .await
                .unwrap();
        }
        assert_eq!(repo.get(&user).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear_only_affects_one_identifier() {
        let repo = MemoryAttemptCounterRepository::new();
        let user1 = id("test1@example.com");
        let user2 = id("test2@example.com");

        for _ in 0..3 {
            repo.increment(&user1, Duration::minutes(15), 5)
                .await
                .unwrap();
            repo.increment(&user2, Duration::minutes(15), 5)
                .await
                .unwrap();
        }

        repo.clear(&user1).await.unwrap();
        repo.clear(&id("absent@example.com")).await.unwrap();

        assert_eq!(repo.get(&user1).await.unwrap(), 0);
        assert_eq!(repo.get(&user2).await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_expires_after_window() {
        let repo = MemoryAttemptCounterRepository::new();
        let user = id("test@example.com");

        repo.increment(&user, Duration::seconds(60), 5)
            .await
            .unwrap();
        repo.increment(&user, Duration::seconds(60), 5)
            .await
            .unwrap();

        tokio::time::advance(StdDuration::from_secs(59)).await;
        assert_eq!(repo.get(&user).await.unwrap(), 2);

        tokio::time::advance(StdDuration::from_secs(2)).await;
        assert_eq!(repo.get(&user).await.unwrap(), 0);

        let count = repo
            .increment(&user, Duration::seconds(60), 5)
            .await
            .unwrap();
        assert_eq!(count, 1, "expired counter restarts at one");
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_refreshes_window() {
        let repo = MemoryAttemptCounterRepository::new();
        let user = id("test@example.com");

        repo.increment(&user, Duration::seconds(60), 5)
            .await
            .unwrap();
        tokio::time::advance(StdDuration::from_secs(45)).await;
        repo.increment(&user, Duration::seconds(60), 5)
            .await
            .unwrap();
        tokio::time::advance(StdDuration::from_secs(45)).await;

        assert_eq!(repo.get(&user).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let repo = MemoryAttemptCounterRepository::new();

        repo.increment(&id("old@example.com"), Duration::seconds(10), 5)
            .await
            .unwrap();
        repo.increment(&id("new@example.com"), Duration::seconds(100), 5)
            .await
            .unwrap();

        tokio::time::advance(StdDuration::from_secs(11)).await;
        assert_eq!(repo.purge_expired(), 1);
        assert_eq!(repo.get(&id("new@example.com")).await.unwrap(), 1);
    }
}
