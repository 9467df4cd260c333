use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, policy::LockoutPolicy};

/// Default prefix for every key the engine writes.
pub const DEFAULT_KEY_PREFIX: &str = "bulwark";

/// What the lock gate answers when the backing store cannot be read.
///
/// Failing open keeps users able to log in during a store outage but
/// suspends brute-force protection for that time; failing closed keeps the
/// protection but turns a store outage into a login outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Treat the account as unlocked and raise an alert.
    #[default]
    FailOpen,
    /// Treat the account as locked and raise an alert.
    FailClosed,
}

impl std::str::FromStr for FailureMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail_open" | "open" => Ok(FailureMode::FailOpen),
            "fail_closed" | "closed" => Ok(FailureMode::FailClosed),
            other => Err(ValidationError::InvalidConfiguration(format!(
                "unknown failure mode: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for FailureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureMode::FailOpen => write!(f, "fail_open"),
            FailureMode::FailClosed => write!(f, "fail_closed"),
        }
    }
}

/// Configuration for the lockout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Whether failed attempts are counted at all. Lock queries and
    /// administrative operations keep working when this is `false`.
    pub enabled: bool,
    /// Thresholds and durations
    pub policy: LockoutPolicy,
    /// Behavior of the lock gate while the store is unavailable
    pub failure_mode: FailureMode,
    /// Prefix for the attempt and lock key families
    pub key_prefix: String,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: LockoutPolicy::default(),
            failure_mode: FailureMode::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl LockoutConfig {
    /// A configuration that never counts failures.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    /// Load configuration from `BULWARK_*` environment variables.
    ///
    /// Unset variables fall back to [`LockoutConfig::default`]:
    ///
    /// - `BULWARK_ENABLED` (`true`/`false`)
    /// - `BULWARK_MAX_ATTEMPTS`
    /// - `BULWARK_ATTEMPT_WINDOW_SECS`
    /// - `BULWARK_LOCK_DURATION_SECS`
    /// - `BULWARK_FAILURE_MODE` (`fail_open`/`fail_closed`)
    /// - `BULWARK_KEY_PREFIX`
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LockoutConfig::default();

        let enabled = match lookup("BULWARK_ENABLED") {
            Some(value) => parse_var("BULWARK_ENABLED", &value)?,
            None => defaults.enabled,
        };

        let max_attempts = match lookup("BULWARK_MAX_ATTEMPTS") {
            Some(value) => parse_var("BULWARK_MAX_ATTEMPTS", &value)?,
            None => defaults.policy.max_attempts(),
        };
        let attempt_window_secs = match lookup("BULWARK_ATTEMPT_WINDOW_SECS") {
            Some(value) => parse_var("BULWARK_ATTEMPT_WINDOW_SECS", &value)?,
            None => defaults.policy.attempt_window_secs(),
        };
        let lock_duration_secs = match lookup("BULWARK_LOCK_DURATION_SECS") {
            Some(value) => parse_var("BULWARK_LOCK_DURATION_SECS", &value)?,
            None => defaults.policy.lock_duration_secs(),
        };
        let policy = LockoutPolicy::from_secs(max_attempts, attempt_window_secs, lock_duration_secs)?;

        let failure_mode = match lookup("BULWARK_FAILURE_MODE") {
            Some(value) => value.parse()?,
            None => defaults.failure_mode,
        };

        let key_prefix = lookup("BULWARK_KEY_PREFIX").unwrap_or(defaults.key_prefix);
        if key_prefix.is_empty() || key_prefix.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidConfiguration(
                "BULWARK_KEY_PREFIX must be non-empty and contain no whitespace".to_string(),
            ));
        }

        Ok(Self {
            enabled,
            policy,
            failure_mode,
            key_prefix,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ValidationError> {
    value.trim().parse().map_err(|_| {
        ValidationError::InvalidConfiguration(format!("{key} has an invalid value: {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LockoutConfig::default();
        assert!(config.enabled);
        assert_eq!(config.failure_mode, FailureMode::FailOpen);
        assert_eq!(config.key_prefix, "bulwark");
        assert_eq!(config.policy, LockoutPolicy::default());
    }

    #[test]
    fn test_disabled() {
        let config = LockoutConfig::disabled();
        assert!(!config.enabled);
        assert_eq!(config.policy, LockoutPolicy::default());
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = LockoutConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, LockoutConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = LockoutConfig::from_lookup(lookup_from(&[
            ("BULWARK_ENABLED", "false"),
            ("BULWARK_MAX_ATTEMPTS", "3"),
            ("BULWARK_ATTEMPT_WINDOW_SECS", "60"),
            ("BULWARK_LOCK_DURATION_SECS", "120"),
            ("BULWARK_FAILURE_MODE", "fail_closed"),
            ("BULWARK_KEY_PREFIX", "im:auth"),
        ]))
        .unwrap();

        assert!(!config.enabled);
        assert_eq!(config.policy.max_attempts(), 3);
        assert_eq!(config.policy.attempt_window_secs(), 60);
        assert_eq!(config.policy.lock_duration_secs(), 120);
        assert_eq!(config.failure_mode, FailureMode::FailClosed);
        assert_eq!(config.key_prefix, "im:auth");
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result =
            LockoutConfig::from_lookup(lookup_from(&[("BULWARK_MAX_ATTEMPTS", "many")]));
        assert!(matches!(
            result,
            Err(ValidationError::InvalidConfiguration(_))
        ));

        let result = LockoutConfig::from_lookup(lookup_from(&[("BULWARK_MAX_ATTEMPTS", "0")]));
        assert!(matches!(result, Err(ValidationError::InvalidPolicy(_))));

        let result =
            LockoutConfig::from_lookup(lookup_from(&[("BULWARK_FAILURE_MODE", "sometimes")]));
        assert!(result.is_err());

        let result = LockoutConfig::from_lookup(lookup_from(&[("BULWARK_KEY_PREFIX", "")]));
        assert!(result.is_err());

        let result = LockoutConfig::from_lookup(lookup_from(&[(
            "BULWARK_LOCK_DURATION_SECS",
            "10000000000000",
        )]));
        assert!(matches!(result, Err(ValidationError::InvalidPolicy(_))));
    }

    #[test]
    fn test_failure_mode_round_trip_names() {
        assert_eq!("fail_open".parse::<FailureMode>().unwrap(), FailureMode::FailOpen);
        assert_eq!("CLOSED".parse::<FailureMode>().unwrap(), FailureMode::FailClosed);
        assert_eq!(FailureMode::FailClosed.to_string(), "fail_closed");
        assert_eq!(
            serde_json::to_string(&FailureMode::FailOpen).unwrap(),
            "\"fail_open\""
        );
    }
}
