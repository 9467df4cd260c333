//! Account lockout service.
//!
//! This module implements per-identifier brute force protection on top of a
//! shared key-value store with atomic increments and per-key expiry.
//!
//! # Features
//!
//! - Failed attempt counting in a sliding window
//! - Automatic, time-limited lock once the threshold is reached
//! - Administrative lock (timed or indefinite), unlock and history clearing,
//!   each independent of the others
//! - Configurable fail-open / fail-closed lock gate during store outages
//! - Security events for audit handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use bulwark_core::services::LockoutService;
//! use bulwark_core::config::LockoutConfig;
//!
//! let service = LockoutService::new(attempts, locks, LockoutConfig::default());
//!
//! // Gate before verifying credentials
//! if service.is_account_locked("user@example.com").await? {
//!     // Return a distinct "locked" outcome, do not record a failure
//! }
//!
//! // After verification
//! if verified {
//!     service.record_login_success("user@example.com").await?;
//! } else {
//!     let failed = service.record_login_failure("user@example.com").await?;
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error, Identifier,
    config::{FailureMode, LockoutConfig},
    events::{ClearReason, EventBus, LockoutEvent, UnlockReason},
    policy::LockoutPolicy,
    repositories::{AttemptCounterRepository, LockStateRepository},
    storage::{LockDuration, LockExpiry, LockOrigin, LockRecord, LockoutState, LockoutStatus},
};

/// Service coordinating attempt counters and lock markers.
///
/// The service keeps no state of its own: every answer comes from the store,
/// so any number of service instances in any number of processes can share
/// one store.
///
/// # Thread Safety
///
/// This service is thread-safe and can be shared across multiple tasks.
pub struct LockoutService<A: AttemptCounterRepository, L: LockStateRepository> {
    attempts: Arc<A>,
    locks: Arc<L>,
    config: LockoutConfig,
    events: Option<EventBus>,
}

impl<A: AttemptCounterRepository, L: LockStateRepository> LockoutService<A, L> {
    /// Create a new LockoutService.
    ///
    /// # Arguments
    ///
    /// * `attempts` - Repository for failed attempt counters
    /// * `locks` - Repository for lock markers
    /// * `config` - Policy, failure mode and enablement
    pub fn new(attempts: Arc<A>, locks: Arc<L>, config: LockoutConfig) -> Self {
        Self {
            attempts,
            locks,
            config,
            events: None,
        }
    }

    /// Emit security events to the given bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.config.policy
    }

    /// Check if failed attempts are being counted.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check if an account is currently locked.
    ///
    /// This is the gate the authentication flow calls before verifying
    /// credentials. If the store cannot be read, the answer follows the
    /// configured [`FailureMode`] and an alert is logged instead of an error
    /// being returned.
    ///
    /// # Errors
    ///
    /// Validation errors, and store errors other than unavailability (for
    /// example a missing table or a corrupt record), are returned.
    pub async fn is_account_locked(&self, identifier: &str) -> Result<bool, Error> {
        let identifier = Identifier::parse(identifier)?;

        match self.locks.is_locked(&identifier).await {
            Ok(locked) => Ok(locked),
            Err(e) if e.is_store_unavailable() => Ok(self.gate_on_store_error(&identifier, &e)),
            Err(e) => Err(e),
        }
    }

    /// Get the number of failed attempts in the current window.
    pub async fn get_login_attempts(&self, identifier: &str) -> Result<u32, Error> {
        let identifier = Identifier::parse(identifier)?;
        self.attempts.get(&identifier).await
    }

    /// Get the number of failures left before the account locks.
    pub async fn get_remaining_attempts(&self, identifier: &str) -> Result<u32, Error> {
        let failed = self.get_login_attempts(identifier).await?;
        Ok(self.config.policy.remaining_attempts(failed))
    }

    /// Get the seconds left on a timed lock.
    ///
    /// Returns 0 when the account is unlocked, and also for an indefinite
    /// lock, which has no expiry to count down to. Use
    /// [`is_account_locked`](Self::is_account_locked) or
    /// [`get_lockout_status`](Self::get_lockout_status) to tell them apart.
    pub async fn get_account_lock_remaining_time(&self, identifier: &str) -> Result<u64, Error> {
        let identifier = Identifier::parse(identifier)?;
        let remaining = self.locks.remaining(&identifier).await?;
        Ok(remaining.map(|expiry| expiry.as_secs()).unwrap_or(0))
    }

    /// Record a failed login attempt.
    ///
    /// A failure against a locked account is ignored: the counter and the
    /// lock's expiry stay as they are. Otherwise the counter is incremented
    /// and, once it reaches the policy threshold, an automatic lock is
    /// placed. When several failures reach the threshold concurrently only
    /// one of them places the lock.
    ///
    /// If counting is disabled this is a no-op returning 0.
    ///
    /// # Returns
    ///
    /// The failed attempt count after this call.
    pub async fn record_login_failure(&self, identifier: &str) -> Result<u32, Error> {
        let identifier = Identifier::parse(identifier)?;

        if !self.config.enabled {
            return Ok(0);
        }

        if self.locks.is_locked(&identifier).await? {
            let count = self.attempts.get(&identifier).await?;
            tracing::debug!(
                identifier = %identifier,
                failed_attempts = count,
                "Ignoring failed login against locked account"
            );
            return Ok(count);
        }

        let policy = &self.config.policy;
        let count = self
            .attempts
            .increment(&identifier, policy.attempt_window(), policy.max_attempts())
            .await?;

        tracing::debug!(
            identifier = %identifier,
            failed_attempts = count,
            max_attempts = policy.max_attempts(),
            "Recorded failed login attempt"
        );

        self.emit(LockoutEvent::LoginFailed {
            identifier: identifier.clone(),
            failed_attempts: count,
            timestamp: Utc::now(),
        })
        .await;

        if count >= policy.max_attempts() {
            let record = LockRecord::automatic(identifier.clone());
            let duration = LockDuration::Timed(policy.lock_duration());

            if self.locks.try_lock(&record, duration).await? {
                tracing::info!(
                    identifier = %identifier,
                    failed_attempts = count,
                    lock_duration_secs = policy.lock_duration_secs(),
                    "Account locked after too many failed login attempts"
                );

                self.emit(LockoutEvent::AccountLocked {
                    identifier,
                    origin: LockOrigin::Automatic,
                    failed_attempts: count,
                    locked_until: record.locked_at.checked_add_signed(policy.lock_duration()),
                    reason: None,
                    timestamp: record.locked_at,
                })
                .await;
            }
        }

        Ok(count)
    }

    /// Record a successful login, clearing the failed attempt counter.
    ///
    /// Callers are expected to have checked
    /// [`is_account_locked`](Self::is_account_locked) before verifying
    /// credentials. If counting is disabled this is a no-op.
    pub async fn record_login_success(&self, identifier: &str) -> Result<(), Error> {
        let identifier = Identifier::parse(identifier)?;

        if !self.config.enabled {
            return Ok(());
        }

        self.attempts.clear(&identifier).await?;

        self.emit(LockoutEvent::LoginFailuresCleared {
            identifier,
            reason: ClearReason::LoginSucceeded,
            timestamp: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Clear the failed attempt history for an account.
    ///
    /// A lock in place stays in place; use
    /// [`unlock_account`](Self::unlock_account) to remove it.
    pub async fn clear_login_failures(&self, identifier: &str) -> Result<(), Error> {
        let identifier = Identifier::parse(identifier)?;

        self.attempts.clear(&identifier).await?;
        tracing::info!(identifier = %identifier, "Cleared failed login attempts");

        self.emit(LockoutEvent::LoginFailuresCleared {
            identifier,
            reason: ClearReason::AdminAction,
            timestamp: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Lock an account until it is explicitly unlocked.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The account to lock
    /// * `reason` - Free-form note stored with the lock and passed to event
    ///   handlers; never interpreted
    pub async fn lock_account(&self, identifier: &str, reason: Option<&str>) -> Result<(), Error> {
        self.lock_account_for(identifier, LockDuration::Indefinite, reason)
            .await
    }

    /// Lock an account for the given duration.
    ///
    /// Replaces any lock already in place, including its expiry. Durations
    /// that fail [`LockDuration::validate`] are rejected before the store is
    /// touched.
    pub async fn lock_account_for(
        &self,
        identifier: &str,
        duration: LockDuration,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let identifier = Identifier::parse(identifier)?;
        duration.validate()?;

        let failed_attempts = self.attempts.get(&identifier).await?;
        let record = LockRecord::administrative(identifier.clone(), reason.map(str::to_string));
        self.locks.lock(&record, duration).await?;

        let locked_until = match duration {
            LockDuration::Timed(d) => record.locked_at.checked_add_signed(d),
            LockDuration::Indefinite => None,
        };

        tracing::info!(
            identifier = %identifier,
            lock_duration_secs = ?duration.ttl_secs(),
            reason = ?record.reason,
            "Account locked by administrator"
        );

        self.emit(LockoutEvent::AccountLocked {
            identifier,
            origin: LockOrigin::Administrative,
            failed_attempts,
            locked_until,
            reason: record.reason,
            timestamp: record.locked_at,
        })
        .await;

        Ok(())
    }

    /// Remove the lock on an account.
    ///
    /// The failed attempt counter is left as it is; use
    /// [`clear_login_failures`](Self::clear_login_failures) to reset it.
    /// Unlocking an account that is not locked succeeds and does nothing.
    pub async fn unlock_account(&self, identifier: &str) -> Result<(), Error> {
        let identifier = Identifier::parse(identifier)?;

        if self.locks.unlock(&identifier).await? {
            tracing::info!(identifier = %identifier, "Account unlocked by administrator");

            self.emit(LockoutEvent::AccountUnlocked {
                identifier,
                reason: UnlockReason::AdminAction,
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(())
    }

    /// Get a snapshot of the lockout state of an account.
    pub async fn get_lockout_status(&self, identifier: &str) -> Result<LockoutStatus, Error> {
        let identifier = Identifier::parse(identifier)?;

        let lock = self.locks.get(&identifier).await?;
        let failed_attempts = self.attempts.get(&identifier).await?;

        let locked_until = match &lock {
            Some(_) => match self.locks.remaining(&identifier).await? {
                Some(LockExpiry::In(remaining)) => Utc::now().checked_add_signed(remaining),
                Some(LockExpiry::Never) | None => None,
            },
            None => None,
        };

        let state = match (&lock, failed_attempts) {
            (Some(_), _) => LockoutState::Locked,
            (None, 0) => LockoutState::Clean,
            (None, _) => LockoutState::Warning,
        };

        Ok(LockoutStatus {
            identifier,
            state,
            failed_attempts,
            remaining_attempts: self.config.policy.remaining_attempts(failed_attempts),
            lock,
            locked_until,
        })
    }

    fn gate_on_store_error(&self, identifier: &Identifier, error: &Error) -> bool {
        match self.config.failure_mode {
            FailureMode::FailOpen => {
                tracing::error!(
                    alert = true,
                    identifier = %identifier,
                    error = %error,
                    failure_mode = %self.config.failure_mode,
                    "Lock store unavailable, treating account as unlocked; brute force protection is suspended"
                );
                false
            }
            FailureMode::FailClosed => {
                tracing::error!(
                    alert = true,
                    identifier = %identifier,
                    error = %error,
                    failure_mode = %self.config.failure_mode,
                    "Lock store unavailable, treating account as locked; logins are denied"
                );
                true
            }
        }
    }

    async fn emit(&self, event: LockoutEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.emit(&event).await {
                tracing::warn!(
                    error = %e,
                    identifier = %event.identifier(),
                    "Lockout event handler failed"
                );
            }
        }
    }
}
