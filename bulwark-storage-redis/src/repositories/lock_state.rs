//! Redis implementation of the lock state repository.

use async_trait::async_trait;
use bulwark_core::{
    Error, Identifier, KeyLayout,
    error::utilities::StorageResultExt,
    repositories::LockStateRepository,
    storage::{LockDuration, LockExpiry, LockRecord},
};
use chrono::Duration;
use redis::Cmd;

use crate::connection::RedisConnection;

/// Redis repository for lock markers.
///
/// A marker is the JSON-encoded [`LockRecord`] stored under the lock key,
/// with a PX expiry for a timed lock and none for an indefinite one.
pub struct RedisLockStateRepository {
    conn: RedisConnection,
    keys: KeyLayout,
}

impl RedisLockStateRepository {
    pub fn new(conn: RedisConnection, keys: KeyLayout) -> Self {
        Self { conn, keys }
    }

    fn set_command(
        &self,
        record: &LockRecord,
        duration: LockDuration,
        only_if_absent: bool,
    ) -> Result<Cmd, Error> {
        let value = serde_json::to_string(record).map_corrupt_err("lock record")?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.keys.lock_key(&record.identifier)).arg(value);
        if only_if_absent {
            cmd.arg("NX");
        }
        if let Some(millis) = duration.ttl_millis() {
            cmd.arg("PX").arg(millis);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl LockStateRepository for RedisLockStateRepository {
    async fn is_locked(&self, identifier: &Identifier) -> Result<bool, Error> {
        self.conn
            .query(
                redis::cmd("EXISTS").arg(self.keys.lock_key(identifier)),
                "Failed to check lock",
            )
            .await
    }

    async fn get(&self, identifier: &Identifier) -> Result<Option<LockRecord>, Error> {
        let value: Option<String> = self
            .conn
            .query(
                redis::cmd("GET").arg(self.keys.lock_key(identifier)),
                "Failed to get lock",
            )
            .await?;

        value
            .map(|raw| serde_json::from_str::<LockRecord>(&raw).map_corrupt_err("lock record"))
            .transpose()
    }

    async fn lock(&self, record: &LockRecord, duration: LockDuration) -> Result<(), Error> {
        // Plain SET drops any TTL the key had, which an indefinite lock relies on
        let cmd = self.set_command(record, duration, false)?;
        let _: String = self.conn.query(&cmd, "Failed to set lock").await?;
        Ok(())
    }

    async fn try_lock(&self, record: &LockRecord, duration: LockDuration) -> Result<bool, Error> {
        let cmd = self.set_command(record, duration, true)?;
        let reply: Option<String> = self.conn.query(&cmd, "Failed to set lock").await?;
        Ok(reply.is_some())
    }

    async fn unlock(&self, identifier: &Identifier) -> Result<bool, Error> {
        let deleted: u64 = self
            .conn
            .query(
                redis::cmd("DEL").arg(self.keys.lock_key(identifier)),
                "Failed to remove lock",
            )
            .await?;

        Ok(deleted > 0)
    }

    async fn remaining(&self, identifier: &Identifier) -> Result<Option<LockExpiry>, Error> {
        let pttl: i64 = self
            .conn
            .query(
                redis::cmd("PTTL").arg(self.keys.lock_key(identifier)),
                "Failed to get lock expiry",
            )
            .await?;

        // -2: no key, -1: no expiry
        Ok(match pttl {
            -2 => None,
            -1 => Some(LockExpiry::Never),
            millis => Some(LockExpiry::In(Duration::milliseconds(millis.max(0)))),
        })
    }
}
