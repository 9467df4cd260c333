//! Records persisted by the lockout engine and the views built from them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Identifier, error::ValidationError, policy::MAX_DURATION_SECS};

/// What caused a lock to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOrigin {
    /// The failed-attempt threshold was reached
    Automatic,
    /// An operator locked the account
    Administrative,
}

impl LockOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockOrigin::Automatic => "automatic",
            LockOrigin::Administrative => "administrative",
        }
    }
}

impl std::str::FromStr for LockOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" => Ok(LockOrigin::Automatic),
            "administrative" => Ok(LockOrigin::Administrative),
            other => Err(format!("unknown lock origin: {other}")),
        }
    }
}

/// The lock marker stored for a locked identifier.
///
/// `reason` is carried for operators and audit handlers; the engine never
/// looks at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub identifier: Identifier,
    pub locked_at: DateTime<Utc>,
    pub origin: LockOrigin,
    pub reason: Option<String>,
}

impl LockRecord {
    pub fn automatic(identifier: Identifier) -> Self {
        Self {
            identifier,
            locked_at: Utc::now(),
            origin: LockOrigin::Automatic,
            reason: None,
        }
    }

    pub fn administrative(identifier: Identifier, reason: Option<String>) -> Self {
        Self {
            identifier,
            locked_at: Utc::now(),
            origin: LockOrigin::Administrative,
            reason,
        }
    }
}

/// How long a lock is kept before the store expires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDuration {
    /// Expires after the given duration
    Timed(Duration),
    /// Never expires; removed only by an explicit unlock
    Indefinite,
}

impl LockDuration {
    /// Whole seconds, with `0` reserved for an indefinite lock.
    ///
    /// Durations longer than [`MAX_DURATION_SECS`] are rejected.
    pub fn from_secs(secs: u64) -> Result<Self, ValidationError> {
        if secs == 0 {
            return Ok(LockDuration::Indefinite);
        }
        match i64::try_from(secs) {
            Ok(secs) if secs <= MAX_DURATION_SECS => {
                Ok(LockDuration::Timed(Duration::seconds(secs)))
            }
            _ => Err(out_of_range()),
        }
    }

    /// A timed lock, rejecting non-positive durations and durations longer
    /// than [`MAX_DURATION_SECS`].
    pub fn timed(duration: Duration) -> Result<Self, ValidationError> {
        let lock = LockDuration::Timed(duration);
        lock.validate()?;
        Ok(lock)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            LockDuration::Timed(duration) if *duration <= Duration::zero() => Err(
                ValidationError::InvalidDuration("lock duration must be positive".to_string()),
            ),
            LockDuration::Timed(duration) if *duration > Duration::seconds(MAX_DURATION_SECS) => {
                Err(out_of_range())
            }
            _ => Ok(()),
        }
    }

    /// Seconds to use as a store TTL, `None` for an indefinite lock.
    pub fn ttl_secs(&self) -> Option<u64> {
        match self {
            LockDuration::Timed(duration) => Some(duration.num_seconds().max(1) as u64),
            LockDuration::Indefinite => None,
        }
    }

    /// Milliseconds to use as a store TTL, `None` for an indefinite lock.
    pub fn ttl_millis(&self) -> Option<i64> {
        match self {
            LockDuration::Timed(duration) => Some(duration.num_milliseconds().max(1)),
            LockDuration::Indefinite => None,
        }
    }
}

fn out_of_range() -> ValidationError {
    ValidationError::InvalidDuration(format!(
        "lock duration must be at most {MAX_DURATION_SECS} seconds"
    ))
}

/// Time left on an active lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockExpiry {
    /// The lock expires after this much time
    In(Duration),
    /// The lock never expires on its own
    Never,
}

impl LockExpiry {
    /// Whole seconds left, rounded up so an active lock never reports zero.
    /// An indefinite lock reports `0`.
    pub fn as_secs(&self) -> u64 {
        match self {
            LockExpiry::In(remaining) => {
                let millis = remaining.num_milliseconds().max(0) as u64;
                millis.div_ceil(1000)
            }
            LockExpiry::Never => 0,
        }
    }
}

/// The observable state of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockoutState {
    /// No recorded failures, not locked
    Clean,
    /// Some failures below the threshold, not locked
    Warning,
    /// A lock marker exists
    Locked,
}

/// Snapshot of the lockout state of one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutStatus {
    pub identifier: Identifier,
    pub state: LockoutState,
    /// Failed attempts in the current window
    pub failed_attempts: u32,
    /// Attempts left before a lock
    pub remaining_attempts: u32,
    /// The active lock, if any
    pub lock: Option<LockRecord>,
    /// When the active lock expires, `None` if unlocked or indefinite
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    pub fn is_locked(&self) -> bool {
        self.state == LockoutState::Locked
    }

    /// Seconds until a timed lock expires, for `Retry-After` style responses.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.locked_until.map(|until| {
            let remaining = until - Utc::now();
            remaining.num_seconds().max(0)
        })
    }
}
