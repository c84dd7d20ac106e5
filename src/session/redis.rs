//! Redis-backed session store
//!
//! Session records are plain keys with `PX` expiry; a per-subject sorted set,
//! scored by each record's expiry in epoch milliseconds, indexes them for bulk
//! revocation. Expired members are trimmed on every `put`, so the index never
//! outgrows the live sessions of its subject. Every round trip is bounded by
//! the configured operation timeout so a stalled Redis fails the request fast.

use super::{subject_index_key, SessionError, SessionStore};
use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, Client};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    op_timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to Redis and verify the connection with `PING`
    pub async fn connect(url: &str, prefix: &str, op_timeout: Duration) -> Result<Self, SessionError> {
        tracing::info!("Initializing Redis session store");

        let client = Client::open(url)
            .map_err(|e| SessionError::Unavailable(format!("failed to create redis client: {}", e)))?;

        let conn = timeout(op_timeout * 4, ConnectionManager::new(client))
            .await
            .map_err(|_| SessionError::Timeout)?
            .map_err(|e| SessionError::Unavailable(format!("failed to connect to redis: {}", e)))?;

        let store = Self {
            conn,
            prefix: prefix.to_string(),
            op_timeout,
        };
        store.ping().await?;

        tracing::info!("Redis session store connection established");
        Ok(store)
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, SessionError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(op, "Redis command failed: {}", e);
                Err(SessionError::Unavailable(format!("redis {} failed: {}", op, e)))
            }
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.op_timeout.as_millis() as u64, "Redis command timed out");
                Err(SessionError::Timeout)
            }
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, key: &str, subject_id: i64, ttl: Duration) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        let index = subject_index_key(&self.prefix, subject_id);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let now_ms = Utc::now().timestamp_millis();
        let expires_at_ms = now_ms.saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX));

        // SET + index update in one MULTI so a record is never unindexed.
        // Every session shares the token lifetime, so the newest put carries
        // the furthest expiry and PEXPIRE never cuts a live member short.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(subject_id)
            .arg("PX")
            .arg(ttl_ms)
            .ignore()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&index)
            .arg("-inf")
            .arg(now_ms)
            .ignore()
            .cmd("ZADD")
            .arg(&index)
            .arg(expires_at_ms)
            .arg(key)
            .ignore()
            .cmd("PEXPIRE")
            .arg(&index)
            .arg(ttl_ms)
            .ignore();

        self.bounded("SET", pipe.query_async(&mut conn)).await
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .bounded("EXISTS", redis::cmd("EXISTS").arg(key).query_async(&mut conn))
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();

        let subject_id: Option<i64> = self
            .bounded("GET", redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;

        match subject_id {
            Some(subject_id) => {
                let index = subject_index_key(&self.prefix, subject_id);
                let mut pipe = redis::pipe();
                pipe.atomic()
                    .cmd("DEL")
                    .arg(key)
                    .ignore()
                    .cmd("ZREM")
                    .arg(&index)
                    .arg(key)
                    .ignore();
                self.bounded("DEL", pipe.query_async(&mut conn)).await
            }
            None => {
                self.bounded("DEL", redis::cmd("DEL").arg(key).query_async(&mut conn))
                    .await
            }
        }
    }

    async fn delete_subject(&self, subject_id: i64) -> Result<u64, SessionError> {
        let mut conn = self.conn.clone();
        let index = subject_index_key(&self.prefix, subject_id);

        let keys: Vec<String> = self
            .bounded(
                "ZRANGE",
                redis::cmd("ZRANGE").arg(&index).arg(0).arg(-1).query_async(&mut conn),
            )
            .await?;

        if keys.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(&keys).cmd("DEL").arg(&index).ignore();
        let (removed,): (u64,) = self.bounded("DEL", pipe.query_async(&mut conn)).await?;

        Ok(removed)
    }

    async fn ping(&self) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        let pong: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;

        if pong != "PONG" {
            return Err(SessionError::Unavailable("redis ping did not return pong".to_string()));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("prefix", &self.prefix)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}
