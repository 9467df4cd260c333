use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    validation::{normalize_identifier, validate_identifier},
};

/// A normalized, validated lockout identifier (typically a lower-cased email).
///
/// Attempt counters and lock markers are both keyed by this value. The only
/// way to obtain one is [`Identifier::parse`], so code holding an
/// `Identifier` never needs to re-validate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Normalize and validate a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = normalize_identifier(raw);
        validate_identifier(&normalized)?;
        Ok(Identifier(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(identifier: Identifier) -> Self {
        identifier.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let id = Identifier::parse("  Alice@Example.com ").unwrap();
        assert_eq!(id.as_str(), "alice@example.com");
        assert_eq!(id.to_string(), "alice@example.com");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(Identifier::parse("").is_err());
        assert!(Identifier::parse("    ").is_err());
    }

    #[test]
    fn test_same_account_different_case_is_equal() {
        assert_eq!(
            Identifier::parse("A@B.COM").unwrap(),
            Identifier::parse("a@b.com").unwrap()
        );
    }

    #[test]
    fn test_serde_validates() {
        let id: Identifier = serde_json::from_str("\"Bob@Example.com\"").unwrap();
        assert_eq!(id.as_str(), "bob@example.com");
        assert!(serde_json::from_str::<Identifier>("\"bad id\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bob@example.com\"");
    }
}
