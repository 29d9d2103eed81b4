//! Redis-backed durable queue and idempotency guard.
//!
//! # Key layout
//!
//! - work queues: `LPUSH` to enqueue, `RPOP` to dequeue (FIFO)
//! - feeds: `LPUSH` + `LTRIM 0 N-1`, newest first
//! - idempotency: `signal:idem:{key}` set with `SET NX EX`
//!
//! Every command is bounded by `command_timeout`; expiry surfaces as
//! `Error::Timeout`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use common::feeds::IDEMPOTENCY_PREFIX;
use common::{DurableQueue, IdempotencyGuard};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Default bound on a single Redis round-trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared Redis store. Cheap to clone; clones share one managed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    command_timeout: Duration,
}

impl RedisStore {
    /// Connect to Redis. The connection manager reconnects on its own afterwards.
    pub async fn connect(redis_url: &str, command_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = tokio::time::timeout(command_timeout, client.get_connection_manager())
            .await
            .map_err(|_| Error::Timeout("redis connect"))??;
        info!("Connected to Redis at {}", redis_url);
        Ok(Self {
            conn,
            command_timeout,
        })
    }

    /// Redis key holding an idempotency marker.
    pub fn idempotency_key(key: &str) -> String {
        format!("{}{}", IDEMPOTENCY_PREFIX, key)
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(Error::Timeout(op)),
        }
    }

    async fn lpush(&self, list: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded("LPUSH", conn.lpush::<_, _, ()>(list, payload))
            .await
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded("RPOP", conn.rpop::<_, Option<String>>(list, None))
            .await
    }

    async fn push_trimmed(&self, list: &str, payload: &str, max_len: usize) -> Result<()> {
        let mut conn = self.conn.clone();
        let stop = max_len.saturating_sub(1) as isize;
        let mut pipe = redis::pipe();
        pipe.lpush(list, payload).ignore().ltrim(list, 0, stop).ignore();
        self.bounded("LPUSH+LTRIM", pipe.query_async(&mut conn))
            .await
    }

    async fn llen(&self, list: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        self.bounded("LLEN", conn.llen::<_, usize>(list)).await
    }

    async fn lrange_newest(&self, list: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        self.bounded(
            "LRANGE",
            conn.lrange::<_, Vec<String>>(list, 0, limit as isize - 1),
        )
        .await
    }

    async fn set_nx_ex(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg("1").arg("NX").arg("EX").arg(ttl_secs.max(1));
        let reply: Option<String> = self
            .bounded("SET NX", cmd.query_async(&mut conn))
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded("DEL", conn.del::<_, ()>(key)).await
    }
}

#[async_trait]
impl DurableQueue for RedisStore {
    async fn enqueue(&self, queue: &str, payload: &str) -> common::Result<()> {
        self.lpush(queue, payload).await?;
        debug!("Enqueued {} bytes on '{}'", payload.len(), queue);
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> common::Result<Option<String>> {
        Ok(self.rpop(queue).await?)
    }

    async fn mirror(&self, feed: &str, payload: &str, max_len: usize) -> common::Result<()> {
        Ok(self.push_trimmed(feed, payload, max_len).await?)
    }

    async fn depth(&self, queue: &str) -> common::Result<usize> {
        Ok(self.llen(queue).await?)
    }

    async fn peek(&self, queue: &str, limit: usize) -> common::Result<Vec<String>> {
        Ok(self.lrange_newest(queue, limit).await?)
    }
}

#[async_trait]
impl IdempotencyGuard for RedisStore {
    async fn try_acquire(&self, key: &str, ttl_secs: u64) -> common::Result<bool> {
        Ok(self.set_nx_ex(&Self::idempotency_key(key), ttl_secs).await?)
    }

    async fn release(&self, key: &str) -> common::Result<()> {
        Ok(self.del(&Self::idempotency_key(key)).await?)
    }
}
