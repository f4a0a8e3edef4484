//! Cache store adapter: a key-value store plus an ordered-score index.
//!
//! [`HotStore`] is the seam between the synchronization logic and the
//! backing store. [`RedisStore`] is the production implementation; the
//! in-memory implementation lives in [`super::memory`].

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("no such key: `{0}`")]
    MissingKey(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Ranked-index and detail-cache operations used by both sync paths and the
/// read path.
///
/// `rename` must be atomic with respect to `zrevrange`: a concurrent reader
/// observes either the source set's previous target or the renamed set in
/// full, never an in-between state. Every implementation is expected to be
/// safe for concurrent use from many tasks.
#[async_trait]
pub trait HotStore: Send + Sync {
    /// Insert-or-update `member` in the sorted set `key` with `score`.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), CacheError>;

    /// Remove `member` from the sorted set `key`. Removing an absent member
    /// is a no-op.
    async fn zrem(&self, key: &str, member: &str) -> Result<(), CacheError>;

    /// Members of `key` ordered by descending score, positions `start..=stop`
    /// inclusive. A missing key yields an empty list.
    async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError>;

    /// Atomically rename `src` to `dest`, replacing `dest` if it exists.
    /// Fails when `src` does not exist.
    async fn rename(&self, src: &str, dest: &str) -> Result<(), CacheError>;

    /// Delete `key` (sorted set or value); absent keys are a no-op.
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Set `key` to `value` with a time-to-live.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch `key`, `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Fetch many keys in one round trip; position `i` corresponds to
    /// `keys[i]`, `None` marking a miss.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;
}

/// Redis-backed [`HotStore`] using a multiplexed connection manager.
///
/// The manager reconnects on its own; individual command failures surface as
/// [`CacheError::Backend`] for the caller to degrade on.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl HotStore for RedisStore {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(key, member).await?;
        Ok(())
    }

    async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrevrange(key, start, stop).await?;
        Ok(members)
    }

    async fn rename(&self, src: &str, dest: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.rename(src, dest).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = conn.mget(keys).await?;
        Ok(values)
    }
}
