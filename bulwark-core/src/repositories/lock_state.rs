//! Repository trait for lock markers.

use async_trait::async_trait;

use crate::{
    Error, Identifier,
    storage::{LockDuration, LockExpiry, LockRecord},
};

/// Repository for per-identifier lock markers.
///
/// A marker's presence is what makes an identifier locked. Markers carry
/// their own time-to-live, or none for an indefinite lock.
///
/// # Security Considerations
///
/// - Lock writes are sets, never increments: repeating a lock call must not
///   stack time-to-lives.
/// - `try_lock` must be a single set-if-absent operation so that only one of
///   many concurrent callers observes the transition into the locked state.
#[async_trait]
pub trait LockStateRepository: Send + Sync + 'static {
    /// Check whether a non-expired lock marker exists.
    async fn is_locked(&self, identifier: &Identifier) -> Result<bool, Error>;

    /// Get the active lock marker, if any.
    async fn get(&self, identifier: &Identifier) -> Result<Option<LockRecord>, Error>;

    /// Create or overwrite the lock marker with the given duration.
    ///
    /// An indefinite duration removes any existing time-to-live.
    async fn lock(&self, record: &LockRecord, duration: LockDuration) -> Result<(), Error>;

    /// Create the lock marker only if no active marker exists.
    ///
    /// # Returns
    ///
    /// `true` if this call created the marker, `false` if one was already present.
    async fn try_lock(&self, record: &LockRecord, duration: LockDuration) -> Result<bool, Error>;

    /// Delete the lock marker unconditionally.
    ///
    /// # Returns
    ///
    /// `true` if an active marker was removed.
    async fn unlock(&self, identifier: &Identifier) -> Result<bool, Error>;

    /// Time left on the active lock, `None` if the identifier is unlocked.
    async fn remaining(&self, identifier: &Identifier) -> Result<Option<LockExpiry>, Error>;
}
