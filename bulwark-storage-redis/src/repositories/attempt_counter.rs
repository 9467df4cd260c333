//! Redis implementation of the attempt counter repository.

use async_trait::async_trait;
use bulwark_core::{
    Error, Identifier, KeyLayout, error::utilities::StorageResultExt,
    repositories::AttemptCounterRepository,
};
use chrono::Duration;
use redis::Script;

use crate::connection::RedisConnection;

/// INCR, clamp to the ceiling, and refresh the TTL in one server-side step.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ceiling = tonumber(ARGV[2])
if count > ceiling then
    count = ceiling
    redis.call('SET', KEYS[1], count)
end
redis.call('PEXPIRE', KEYS[1], ARGV[1])
return count
"#;

/// Redis repository for failed attempt counters.
///
/// Counters are integer keys whose TTL is the attempt window; Redis expires
/// them natively.
pub struct RedisAttemptCounterRepository {
    conn: RedisConnection,
    keys: KeyLayout,
    increment: Script,
}

impl RedisAttemptCounterRepository {
    pub fn new(conn: RedisConnection, keys: KeyLayout) -> Self {
        Self {
            conn,
            keys,
            increment: Script::new(INCREMENT_SCRIPT),
        }
    }
}

#[async_trait]
impl AttemptCounterRepository for RedisAttemptCounterRepository {
    async fn increment(
        &self,
        identifier: &Identifier,
        window: Duration,
        ceiling: u32,
    ) -> Result<u32, Error> {
        let mut invocation = self.increment.prepare_invoke();
        invocation
            .key(self.keys.attempts_key(identifier))
            .arg(window.num_milliseconds().max(1))
            .arg(ceiling.max(1));

        self.conn
            .invoke(&invocation, "Failed to increment attempt counter")
            .await
    }

    async fn get(&self, identifier: &Identifier) -> Result<u32, Error> {
        let value: Option<String> = self
            .conn
            .query(
                redis::cmd("GET").arg(self.keys.attempts_key(identifier)),
                "Failed to get attempt counter",
            )
            .await?;

        match value {
            Some(raw) => raw.parse::<u32>().map_corrupt_err("attempt counter"),
            None => Ok(0),
        }
    }

    async fn clear(&self, identifier: &Identifier) -> Result<(), Error> {
        let _: u64 = self
            .conn
            .query(
                redis::cmd("DEL").arg(self.keys.attempts_key(identifier)),
                "Failed to clear attempt counter",
            )
            .await?;

        Ok(())
    }
}
