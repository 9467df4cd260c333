//! Core functionality for the bulwark project
//!
//! This crate contains the lockout engine and everything it is built from:
//! the identifier and policy types, the records kept in the store, the
//! repository traits storage backends implement, and the security events
//! emitted on state changes.
//!
//! Application code normally uses the `bulwark` crate, which wires a storage
//! backend to [`LockoutService`]. Depend on this crate directly to implement
//! a custom storage backend; see [`RepositoryProvider`].
pub mod config;
pub mod error;
pub mod events;
pub mod identifier;
pub mod keys;
pub mod policy;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod validation;

pub use config::{FailureMode, LockoutConfig};
pub use error::Error;
pub use events::{EventBus, EventHandler, LockoutEvent};
pub use identifier::Identifier;
pub use keys::KeyLayout;
pub use policy::LockoutPolicy;
pub use repositories::RepositoryProvider;
pub use services::LockoutService;
pub use storage::{LockDuration, LockExpiry, LockOrigin, LockRecord, LockoutState, LockoutStatus};
