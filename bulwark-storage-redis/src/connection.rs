//! Shared connection handle with per-command timeouts.

use std::time::Duration;

use bulwark_core::{Error, error::StorageError};
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue, RedisError, RedisResult, ScriptInvocation};

/// Default time allowed for a single command round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// A cloneable Redis connection.
///
/// The [`ConnectionManager`] reconnects on its own after a dropped
/// connection; every command runs on a cheap clone of it.
#[derive(Clone)]
pub struct RedisConnection {
    manager: ConnectionManager,
    timeout: Duration,
}

impl RedisConnection {
    pub fn new(manager: ConnectionManager, timeout: Duration) -> Self {
        Self { manager, timeout }
    }

    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Run a command, mapping driver errors and timeouts to storage errors.
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd, context: &str) -> Result<T, Error> {
        let mut conn = self.manager.clone();
        let result: Option<RedisResult<T>> =
            tokio::time::timeout(self.timeout, cmd.query_async(&mut conn))
                .await
                .ok();
        self.finish(result, context)
    }

    /// Run a prepared script invocation.
    pub async fn invoke<T: FromRedisValue>(
        &self,
        invocation: &ScriptInvocation<'_>,
        context: &str,
    ) -> Result<T, Error> {
        let mut conn = self.manager.clone();
        let result: Option<RedisResult<T>> =
            tokio::time::timeout(self.timeout, invocation.invoke_async(&mut conn))
                .await
                .ok();
        self.finish(result, context)
    }

    fn finish<T>(&self, result: Option<RedisResult<T>>, context: &str) -> Result<T, Error> {
        match result {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(map_redis_err(e, context)),
            None => {
                tracing::error!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "{context}: timed out"
                );
                Err(Error::Storage(StorageError::Timeout(context.to_string())))
            }
        }
    }
}

/// Log a driver error and classify it as a bulwark storage error.
pub(crate) fn map_redis_err(error: RedisError, context: &str) -> Error {
    tracing::error!(error = %error, "{context}");

    let storage_error = if error.is_timeout() {
        StorageError::Timeout(context.to_string())
    } else if error.is_connection_dropped() || error.is_connection_refusal() || error.is_io_error()
    {
        StorageError::Connection(context.to_string())
    } else {
        StorageError::Database(context.to_string())
    };

    Error::Storage(storage_error)
}
