//! Repository implementations for in-memory storage

pub mod attempt_counter;
pub mod lock_state;

pub use attempt_counter::MemoryAttemptCounterRepository;
pub use lock_state::MemoryLockStateRepository;
