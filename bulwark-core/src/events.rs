use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{Identifier, error::EventError, storage::LockOrigin};

/// Reason why an account was unlocked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// An operator removed the lock
    AdminAction,
}

/// Reason why the failed attempt counter was cleared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    /// The user authenticated successfully
    LoginSucceeded,
    /// An operator cleared the attempt history
    AdminAction,
}

/// Security events emitted by the lockout service
///
/// Events are the hook for audit logging and alerting. The service emits
/// them after the corresponding store write has succeeded, and a failing
/// handler never fails the operation that produced the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockoutEvent {
    /// Emitted when a failed login is counted.
    LoginFailed {
        /// The identifier that was attempted
        identifier: Identifier,
        /// Failed attempts in the current window, including this one
        failed_attempts: u32,
        /// When the attempt was recorded
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an account becomes locked.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        /// The identifier that was locked
        identifier: Identifier,
        /// Whether the threshold or an operator placed the lock
        origin: LockOrigin,
        /// Failed attempts at the time of locking
        failed_attempts: u32,
        /// When the lock expires, `None` for an indefinite lock
        locked_until: Option<DateTime<Utc>>,
        /// Opaque reason supplied by the operator
        reason: Option<String>,
        /// When the lock was placed
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an active lock is removed explicitly.
    AccountUnlocked {
        /// The identifier that was unlocked
        identifier: Identifier,
        /// Why the account was unlocked
        reason: UnlockReason,
        /// When the unlock occurred
        timestamp: DateTime<Utc>,
    },

    /// Emitted when the failed attempt counter is cleared.
    LoginFailuresCleared {
        /// The identifier whose counter was cleared
        identifier: Identifier,
        /// Why the counter was cleared
        reason: ClearReason,
        /// When the counter was cleared
        timestamp: DateTime<Utc>,
    },
}

impl LockoutEvent {
    pub fn identifier(&self) -> &Identifier {
        match self {
            LockoutEvent::LoginFailed { identifier, .. }
            | LockoutEvent::AccountLocked { identifier, .. }
            | LockoutEvent::AccountUnlocked { identifier, .. }
            | LockoutEvent::LoginFailuresCleared { identifier, .. } => identifier,
        }
    }
}

/// A trait for handling events emitted by the event bus
///
/// Implementors of this trait can be registered with the [`EventBus`] to
/// receive and process events.
///
/// # Examples
///
/// ```
/// # use bulwark_core::events::{LockoutEvent, EventHandler};
/// # use bulwark_core::error::EventError;
/// # use async_trait::async_trait;
/// struct AuditHandler;
///
/// #[async_trait]
/// impl EventHandler for AuditHandler {
///     async fn handle_event(&self, event: &LockoutEvent) -> Result<(), EventError> {
///         // Write the event to the audit log...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &LockoutEvent) -> Result<(), EventError>;
}

/// Event bus that can emit events and register event handlers
///
/// Handlers are called in registration order; the first handler error stops
/// the dispatch and is returned to the emitter.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Number of registered handlers
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }

    /// Emit an event to all registered handlers
    pub async fn emit(&self, event: &LockoutEvent) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}
