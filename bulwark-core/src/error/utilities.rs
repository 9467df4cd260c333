use crate::{Error, error::StorageError};

/// Extension trait for Result types to simplify store error mapping
///
/// Backends use this to turn driver and codec errors into bulwark storage
/// errors without repeating the same `map_err` closure at every call site.
/// Driver errors are classified by each backend itself (see
/// [`StorageError::Connection`] and [`StorageError::Timeout`]); this trait
/// covers values that were read fine but cannot be decoded.
///
/// # Example
///
/// ```rust
/// use bulwark_core::error::utilities::StorageResultExt;
///
/// let raw: Result<u32, std::num::ParseIntError> = "12".parse::<u32>();
/// let count = raw.map_corrupt_err("attempt counter").unwrap();
/// assert_eq!(count, 12);
/// ```
pub trait StorageResultExt<T> {
    /// Convert a decoding error on a stored value to a corrupt record error
    fn map_corrupt_err(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> StorageResultExt<T> for Result<T, E> {
    fn map_corrupt_err(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Corrupt(format!("{context}: {e}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_corrupt_err() {
        let error_result: Result<u32, _> = "not-a-number".parse::<u32>();
        let mapped = error_result.map_corrupt_err("attempt counter");

        match mapped.unwrap_err() {
            Error::Storage(StorageError::Corrupt(msg)) => {
                assert!(msg.starts_with("attempt counter: "));
            }
            _ => panic!("Expected corrupt record error"),
        }
    }

    #[test]
    fn test_ok_passes_through() {
        let ok: Result<i32, &str> = Ok(42);
        assert_eq!(ok.map_corrupt_err("unused").unwrap(), 42);
    }
}
