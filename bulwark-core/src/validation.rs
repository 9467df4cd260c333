//! Centralized validation for lockout identifiers
//!
//! Identifiers are the key space for both attempt counters and lock markers,
//! so every public engine operation runs them through here before touching
//! the store.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Longest identifier accepted, matching the practical limit of an email address.
pub const MAX_IDENTIFIER_LEN: usize = 254;

/// Lazy-loaded identifier regex
///
/// Accepts any run of printable characters without whitespace. Identifiers
/// are usually email addresses but phone numbers and usernames are valid too.
static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s\p{Cc}]+$").expect("Invalid identifier regex pattern")
});

/// Validates an identifier
///
/// # Arguments
///
/// * `identifier` - The identifier to validate, already normalized
///
/// # Returns
///
/// Returns `Ok(())` if the identifier is valid, or a `ValidationError` if invalid.
///
/// # Examples
///
/// ```rust
/// use bulwark_core::validation::validate_identifier;
///
/// assert!(validate_identifier("user@example.com").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("two words").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    if identifier.is_empty() {
        return Err(ValidationError::MissingField(
            "Identifier is required".to_string(),
        ));
    }

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::InvalidIdentifier(format!(
            "Identifier must be no more than {MAX_IDENTIFIER_LEN} bytes long"
        )));
    }

    if IDENTIFIER_REGEX.is_match(identifier) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(
            "Identifier must not contain whitespace or control characters".to_string(),
        ))
    }
}

/// Normalizes a raw identifier by trimming surrounding whitespace and
/// lower-casing it.
///
/// # Examples
///
/// ```rust
/// use bulwark_core::validation::normalize_identifier;
///
/// assert_eq!(normalize_identifier("  Alice@Example.COM "), "alice@example.com");
/// ```
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}
