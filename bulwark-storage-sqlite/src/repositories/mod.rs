//! Repository implementations for SQLite storage

pub mod attempt_counter;
pub mod lock_state;

pub use attempt_counter::SqliteAttemptCounterRepository;
pub use lock_state::SqliteLockStateRepository;

use bulwark_core::{Error, error::StorageError};

/// Log a driver error and classify it as a bulwark storage error.
///
/// Pool exhaustion and I/O failures mean the database could not be reached;
/// the lock gate treats those as an outage.
pub(crate) fn map_sqlx_err(error: sqlx::Error, context: &str) -> Error {
    tracing::error!(error = %error, "{context}");

    let storage_error = match error {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(context.to_string()),
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            StorageError::Connection(context.to_string())
        }
        _ => StorageError::Database(context.to_string()),
    };

    Error::Storage(storage_error)
}
