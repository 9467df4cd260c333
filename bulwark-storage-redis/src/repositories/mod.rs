//! Repository implementations for Redis storage

pub mod attempt_counter;
pub mod lock_state;

pub use attempt_counter::RedisAttemptCounterRepository;
pub use lock_state::RedisLockStateRepository;
