//! Redis implementation of [`KeyValueStore`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

const SCAN_BATCH: usize = 200;

const HSET_IF_EXISTS: &str = r"
    if redis.call('EXISTS', KEYS[1]) == 1 then
        redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
        return 1
    end
    return 0
";

/// Store backed by a multiplexed Redis connection.
///
/// Every command runs under `call_timeout`; a command that exceeds it fails
/// with [`StoreError::Timeout`] instead of stalling the caller.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    call_timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl RedisStore {
    /// Open a managed connection to `url`.
    ///
    /// `url` may be a full `redis://` URL or a bare `host:port` pair.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid or the server cannot be reached
    /// within `call_timeout`.
    pub async fn connect(
        url: &str,
        password: Option<&str>,
        call_timeout: Duration,
    ) -> StoreResult<Self> {
        let url = connection_url(url, password);
        let client = redis::Client::open(url.as_str()).map_err(|source| StoreError::Redis {
            operation: "redis.open",
            source,
        })?;
        let conn = tokio::time::timeout(call_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "redis.connect",
                timeout: call_timeout,
            })?
            .map_err(|source| StoreError::Redis {
                operation: "redis.connect",
                source,
            })?;
        info!(address = %redact(&url), "connected to redis");
        Ok(Self { conn, call_timeout })
    }

    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, RedisError>> + Send,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|source| StoreError::Redis { operation, source }),
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout: self.call_timeout,
            }),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        self.guarded("redis.hgetall", async move {
            conn.hgetall::<_, HashMap<String, String>>(key).await
        })
        .await
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut command = redis::cmd("HSET");
        command.arg(key);
        for (field, value) in fields {
            command.arg(*field).arg(value.as_str());
        }
        let mut conn = self.conn.clone();
        self.guarded("redis.hset", async move {
            command.query_async::<()>(&mut conn).await
        })
        .await
    }

    async fn hash_set_existing(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let script = Script::new(HSET_IF_EXISTS);
        let mut invocation = script.prepare_invoke();
        invocation.key(key).arg(field).arg(value);
        let mut conn = self.conn.clone();
        let updated = self
            .guarded("redis.hset_existing", async move {
                invocation.invoke_async::<i64>(&mut conn).await
            })
            .await?;
        Ok(updated == 1)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        self.guarded("redis.del", async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();
        let mut keys = self
            .guarded("redis.scan", async move {
                let mut cursor: u64 = 0;
                let mut keys = Vec::new();
                loop {
                    let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await?;
                    keys.extend(batch);
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Ok(keys)
            })
            .await?;
        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        self.guarded("redis.sadd", async move {
            conn.sadd::<_, _, ()>(key, member).await
        })
        .await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        self.guarded("redis.srem", async move {
            conn.srem::<_, _, ()>(key, member).await
        })
        .await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        self.guarded("redis.smembers", async move {
            conn.smembers::<_, Vec<String>>(key).await
        })
        .await
    }

    async fn list_push(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        self.guarded("redis.rpush", async move {
            conn.rpush::<_, _, ()>(key, value).await
        })
        .await
    }

    async fn list_pop(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        self.guarded("redis.lpop", async move {
            redis::cmd("LPOP")
                .arg(key)
                .query_async::<Option<Vec<u8>>>(&mut conn)
                .await
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        self.guarded("redis.expire", async move {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(seconds)
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }
}

/// Normalise the configured address into a `redis://` URL carrying `password`.
#[must_use]
pub fn connection_url(address: &str, password: Option<&str>) -> String {
    let address = address.trim();
    let (scheme, rest) = match address.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("redis", address),
    };
    match password.filter(|value| !value.is_empty()) {
        Some(password) if !rest.contains('@') => format!("{scheme}://:{password}@{rest}"),
        _ => format!("{scheme}://{rest}"),
    }
}

fn redact(url: &str) -> String {
    match (url.split_once("://"), url.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, host))) => format!("{scheme}://***@{host}"),
        _ => url.to_string(),
    }
}
