//! Lockout thresholds and durations.

use chrono::Duration;

use crate::error::ValidationError;

/// Longest attempt window or lock duration accepted, 100 years.
pub const MAX_DURATION_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Immutable lockout thresholds.
///
/// A policy is validated once at construction and then only read. Engines
/// receive it by value inside a [`LockoutConfig`](crate::config::LockoutConfig)
/// rather than reading ambient configuration.
///
/// # Example
///
/// ```rust
/// use bulwark_core::policy::LockoutPolicy;
/// use chrono::Duration;
///
/// let policy = LockoutPolicy::new(3, Duration::minutes(10), Duration::hours(1)).unwrap();
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.lock_duration_secs(), 3600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_attempts: u32,
    attempt_window: Duration,
    lock_duration: Duration,
}

impl LockoutPolicy {
    /// Create a policy, rejecting a zero threshold and durations shorter than
    /// one second or longer than [`MAX_DURATION_SECS`].
    pub fn new(
        max_attempts: u32,
        attempt_window: Duration,
        lock_duration: Duration,
    ) -> Result<Self, ValidationError> {
        if max_attempts == 0 {
            return Err(ValidationError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        check_bounds(attempt_window, "attempt_window")?;
        check_bounds(lock_duration, "lock_duration")?;

        Ok(Self {
            max_attempts,
            attempt_window,
            lock_duration,
        })
    }

    /// Create a policy from whole seconds.
    pub fn from_secs(
        max_attempts: u32,
        attempt_window_secs: u64,
        lock_duration_secs: u64,
    ) -> Result<Self, ValidationError> {
        Self::new(
            max_attempts,
            seconds(attempt_window_secs, "attempt_window")?,
            seconds(lock_duration_secs, "lock_duration")?,
        )
    }

    /// Failed attempts within one window that trigger a lock.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sliding window after which an idle attempt counter expires.
    pub fn attempt_window(&self) -> Duration {
        self.attempt_window
    }

    /// How long an automatic lock lasts.
    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    pub fn attempt_window_secs(&self) -> u64 {
        self.attempt_window.num_seconds() as u64
    }

    pub fn lock_duration_secs(&self) -> u64 {
        self.lock_duration.num_seconds() as u64
    }

    /// Attempts left before the next failure locks the account.
    pub fn remaining_attempts(&self, failed_attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(failed_attempts)
    }
}

impl Default for LockoutPolicy {
    /// 5 attempts per 15-minute window, 30-minute lock.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_window: Duration::minutes(15),
            lock_duration: Duration::minutes(30),
        }
    }
}

fn check_bounds(duration: Duration, field: &str) -> Result<(), ValidationError> {
    if duration < Duration::seconds(1) {
        return Err(ValidationError::InvalidPolicy(format!(
            "{field} must be at least one second"
        )));
    }
    if duration > Duration::seconds(MAX_DURATION_SECS) {
        return Err(ValidationError::InvalidPolicy(format!(
            "{field} must be at most {MAX_DURATION_SECS} seconds"
        )));
    }
    Ok(())
}

fn seconds(secs: u64, field: &str) -> Result<Duration, ValidationError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ValidationError::InvalidPolicy(format!("{field} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.attempt_window_secs(), 900);
        assert_eq!(policy.lock_duration_secs(), 1800);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let result = LockoutPolicy::new(0, Duration::minutes(1), Duration::minutes(1));
        assert!(matches!(result, Err(ValidationError::InvalidPolicy(_))));
    }

    #[test]
    fn test_rejects_sub_second_durations() {
        assert!(LockoutPolicy::new(3, Duration::zero(), Duration::minutes(1)).is_err());
        assert!(LockoutPolicy::new(3, Duration::minutes(1), Duration::milliseconds(500)).is_err());
        assert!(LockoutPolicy::new(3, Duration::seconds(-5), Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_from_secs() {
        let policy = LockoutPolicy::from_secs(5, 60, 1800).unwrap();
        assert_eq!(policy.attempt_window(), Duration::seconds(60));
        assert_eq!(policy.lock_duration(), Duration::seconds(1800));

        assert!(LockoutPolicy::from_secs(5, 0, 1800).is_err());
        assert!(LockoutPolicy::from_secs(5, u64::MAX, 1800).is_err());
    }

    #[test]
    fn test_rejects_durations_past_cap() {
        let cap = MAX_DURATION_SECS as u64;
        assert!(LockoutPolicy::from_secs(5, cap, cap).is_ok());

        let result = LockoutPolicy::from_secs(1, 60, 10_000_000_000_000);
        assert!(matches!(result, Err(ValidationError::InvalidPolicy(_))));
        assert!(LockoutPolicy::from_secs(1, cap + 1, 60).is_err());
        assert!(LockoutPolicy::new(1, Duration::minutes(1), Duration::MAX).is_err());
    }

    #[test]
    fn test_remaining_attempts_never_negative() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.remaining_attempts(0), 5);
        assert_eq!(policy.remaining_attempts(3), 2);
        assert_eq!(policy.remaining_attempts(5), 0);
        assert_eq!(policy.remaining_attempts(9), 0);
    }
}
