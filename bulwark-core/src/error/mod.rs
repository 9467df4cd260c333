pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// Whether the backing store could not be reached at all, as opposed to
    /// the store rejecting a command.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Storage(StorageError::Connection(_)) | Error::Storage(StorageError::Timeout(_))
        )
    }
}
