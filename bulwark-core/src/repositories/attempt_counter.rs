//! Repository trait for failed-attempt counters.

use async_trait::async_trait;
use chrono::Duration;

use crate::{Error, Identifier};

/// Repository for per-identifier failed login attempt counters.
///
/// Each identifier has at most one counter, stored with a time-to-live equal
/// to the attempt window. Absence of a counter means zero attempts.
///
/// # Concurrency
///
/// Implementations are called concurrently from many processes. `increment`
/// must be a single atomic operation against the store (never a read
/// followed by a write) so that no increment is lost.
#[async_trait]
pub trait AttemptCounterRepository: Send + Sync + 'static {
    /// Atomically increment the counter for an identifier.
    ///
    /// Creates the counter at 1 if it is absent or expired. Otherwise adds
    /// one, saturating at `ceiling`. In both cases the time-to-live is reset
    /// to `window`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The identifier whose counter to increment
    /// * `window` - Time-to-live to set on the counter
    /// * `ceiling` - Largest value the counter may hold
    ///
    /// # Returns
    ///
    /// The counter value after the increment.
    async fn increment(
        &self,
        identifier: &Identifier,
        window: Duration,
        ceiling: u32,
    ) -> Result<u32, Error>;

    /// Get the current counter value, or 0 if absent or expired.
    async fn get(&self, identifier: &Identifier) -> Result<u32, Error>;

    /// Delete the counter. Deleting an absent counter is not an error.
    async fn clear(&self, identifier: &Identifier) -> Result<(), Error>;
}
