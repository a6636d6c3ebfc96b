//! Redis-backed store
//!
//! Counters map onto INCRBY, sets onto SADD/SMEMBERS and prefix listing onto a SCAN
//! loop, so every operation is atomic on the server side and several Turbine
//! processes can share one Redis.

use std::time::Duration;

use bytes::Bytes;
use contracts::{KvStore, StoreError};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, RedisError};
use tracing::{debug, info, instrument};

/// Keys requested per SCAN round trip
const SCAN_COUNT: usize = 500;

/// Connect and response timeout
const TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnect attempts before an operation reports the store unavailable
const RECONNECT_RETRIES: usize = 2;

/// `KvStore` over a multiplexed, auto-reconnecting Redis connection
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `url`
    ///
    /// Accepts `redis://`, `rediss://` and `unix://` URLs as well as the
    /// `tcp://host:port` form Docker links export.
    #[instrument(name = "redis_connect", skip(url))]
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let url = normalize_url(url);
        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::unavailable(format!("invalid redis url '{url}': {e}")))?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(TIMEOUT)
            .set_response_timeout(TIMEOUT)
            .set_number_of_retries(RECONNECT_RETRIES);
        let manager = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(|e| StoreError::unavailable(format!("redis connect failed: {e}")))?;
        info!(url = %url, "redis store connected");
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let value: Option<Vec<u8>> = self.conn().get(key).await.map_err(|e| classify(key, e))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let () = self
            .conn()
            .set(key, value.to_vec())
            .await
            .map_err(|e| classify(key, e))?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Bytes) -> Result<bool, StoreError> {
        self.conn()
            .set_nx(key, value.to_vec())
            .await
            .map_err(|e| classify(key, e))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: i64 = self.conn().del(key).await.map_err(|e| classify(key, e))?;
        Ok(removed > 0)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        if delta != 0 {
            return self
                .conn()
                .incr(key, delta)
                .await
                .map_err(|e| classify(key, e));
        }
        // Reading must not create the key
        let raw: Option<String> = self.conn().get(key).await.map_err(|e| classify(key, e))?;
        match raw {
            None => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::malformed(key, format!("'{raw}' is not a counter"))),
        }
    }

    async fn keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}*", glob_escape(prefix));
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| classify(prefix, e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        debug!(prefix, keys = keys.len(), "redis scan finished");
        Ok(keys)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added: i64 = self
            .conn()
            .sadd(key, member)
            .await
            .map_err(|e| classify(key, e))?;
        Ok(added > 0)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut members: Vec<String> = self
            .conn()
            .smembers(key)
            .await
            .map_err(|e| classify(key, e))?;
        members.sort();
        Ok(members)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _pong: String = redis::cmd("PING")
            .query_async(&mut self.conn())
            .await
            .map_err(|e| classify("", e))?;
        Ok(())
    }
}

/// Rewrite the Docker-link `tcp://` scheme to `redis://`
pub(crate) fn normalize_url(url: &str) -> String {
    match url.strip_prefix("tcp://") {
        Some(rest) => format!("redis://{rest}"),
        None => url.to_string(),
    }
}

/// Escape SCAN glob metacharacters so the prefix matches literally
pub(crate) fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Connection trouble is `Unavailable` (retried, restarts the worker); anything the
/// server rejected, such as INCRBY on a non-integer, is `Malformed`.
fn classify(key: &str, err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        StoreError::unavailable(format!("redis: {err}"))
    } else {
        StoreError::malformed(key, err.to_string())
    }
}
