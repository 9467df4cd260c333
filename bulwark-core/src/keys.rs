//! Key layout shared by key-value backends.

use crate::{Identifier, config::DEFAULT_KEY_PREFIX};

/// Builds the two key families the engine persists:
/// `{prefix}:attempts:{identifier}` and `{prefix}:lock:{identifier}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn attempts_key(&self, identifier: &Identifier) -> String {
        format!("{}:attempts:{}", self.prefix, identifier)
    }

    pub fn lock_key(&self, identifier: &Identifier) -> String {
        format!("{}:lock:{}", self.prefix, identifier)
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_families() {
        let keys = KeyLayout::default();
        let id = Identifier::parse("A@B.com").unwrap();
        assert_eq!(keys.attempts_key(&id), "bulwark:attempts:a@b.com");
        assert_eq!(keys.lock_key(&id), "bulwark:lock:a@b.com");
    }

    #[test]
    fn test_custom_prefix() {
        let keys = KeyLayout::new("im:auth");
        let id = Identifier::parse("bob").unwrap();
        assert_eq!(keys.attempts_key(&id), "im:auth:attempts:bob");
        assert_eq!(keys.prefix(), "im:auth");
    }
}
