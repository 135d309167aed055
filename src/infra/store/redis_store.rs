//! Redis-backed store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{KeyValueStore, StoreError};

/// Store speaking to a single Redis instance over a multiplexed connection.
///
/// The connection is opened lazily and dropped after any failure so the next call
/// reconnects. Every call, including the wait for a concurrent connect, finishes within
/// `timeout`.
pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisStore {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url)
            .map_err(|err| StoreError::unavailable(format!("invalid redis url: {err}")))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout,
        })
    }

    /// Cached connection, or a fresh one. Callers bound the whole call, lock wait included.
    async fn connection(&self) -> Result<MultiplexedConnection, RedisError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }

        let connection = self.client.get_multiplexed_async_connection().await?;
        info!(target = "timetable::store", "redis connection established");
        *guard = Some(connection.clone());
        Ok(connection)
    }

    /// Drop the cached connection unless another caller is mid-connect.
    fn reset(&self) {
        if let Ok(mut guard) = self.connection.try_lock() {
            guard.take();
        }
    }

    /// Run a command under one deadline covering connect and round trip. The cached
    /// connection is dropped when the store looks unreachable.
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let deadline = Instant::now() + self.timeout;
        let attempt = async {
            let connection = self.connection().await?;
            command(connection).await
        };
        let result = match tokio::time::timeout_at(deadline, attempt).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(map_redis_error(err)),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };

        let unreachable = result
            .as_ref()
            .err()
            .filter(|err| !matches!(err, StoreError::Command { .. }));
        if let Some(err) = unreachable {
            warn!(
                target = "timetable::store",
                op,
                error = %err,
                "redis operation failed, reconnecting on next use"
            );
            self.reset();
        }
        result
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_timeout()
        || err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
    {
        StoreError::unavailable(err.to_string())
    } else {
        StoreError::command(err.to_string())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.run("get", |mut conn| async move { conn.get(key).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        let seconds = ttl.as_secs().max(1);
        self.run("set_ex", |mut conn| async move {
            conn.set_ex(key, value, seconds).await
        })
        .await
    }

    async fn incr_expiring(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let key = key.to_string();
        let seconds = ttl.as_secs().max(1);
        self.run("incr_expiring", |mut conn| async move {
            let (count,): (i64,) = redis::pipe()
                .atomic()
                .cmd("SET")
                .arg(&key)
                .arg(0)
                .arg("NX")
                .arg("EX")
                .arg(seconds)
                .ignore()
                .cmd("INCR")
                .arg(&key)
                .query_async(&mut conn)
                .await?;
            Ok::<_, RedisError>(count)
        })
        .await
    }

    async fn is_alive(&self) -> bool {
        let probe = self
            .run("ping", |mut conn| async move {
                conn.req_packed_command(&redis::cmd("PING")).await
            })
            .await;
        match probe {
            Ok(_) => true,
            Err(err) => {
                debug!(target = "timetable::store", error = %err, "redis liveness probe failed");
                false
            }
        }
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.run("flushall", |mut conn| async move {
            conn.req_packed_command(&redis::cmd("FLUSHALL"))
                .await
                .map(|_| ())
        })
        .await
    }
}
