//! In-memory [`HotStore`] used by tests and single-process deployments.
//!
//! One `RwLock` guards the whole state, so `rename` is atomic with respect
//! to every reader, matching the contract the resync cutover depends on.
//! Expired values are dropped lazily on read.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::lock::{rw_read, rw_write};
use super::store::{CacheError, HotStore};

const SOURCE: &str = "cache::memory";

#[derive(Default)]
struct MemoryState {
    zsets: HashMap<String, HashMap<String, f64>>,
    values: HashMap<String, StoredValue>,
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn live(&self, now: Instant) -> Option<&str> {
        match self.expires_at {
            Some(deadline) if deadline <= now => None,
            _ => Some(&self.value),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HotStore for MemoryStore {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "zadd");
        state
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "zrem");
        if let Some(set) = state.zsets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let state = rw_read(&self.state, SOURCE, "zrevrange");
        let Some(set) = state.zsets.get(key) else {
            return Ok(Vec::new());
        };

        let mut members: Vec<(&String, f64)> = set.iter().map(|(m, s)| (m, *s)).collect();
        // Redis orders ties lexicographically; reversed here along with score.
        members.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.cmp(a.0))
        });

        let start = start.max(0) as usize;
        let stop = stop.max(-1);
        if stop < 0 {
            return Ok(Vec::new());
        }
        let end = (stop as usize + 1).min(members.len());
        if start >= end {
            return Ok(Vec::new());
        }

        Ok(members[start..end]
            .iter()
            .map(|(m, _)| (*m).clone())
            .collect())
    }

    async fn rename(&self, src: &str, dest: &str) -> Result<(), CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "rename");
        if let Some(set) = state.zsets.remove(src) {
            state.zsets.insert(dest.to_string(), set);
            return Ok(());
        }
        if let Some(value) = state.values.remove(src) {
            state.values.insert(dest.to_string(), value);
            return Ok(());
        }
        Err(CacheError::MissingKey(src.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "del");
        state.zsets.remove(key);
        state.values.remove(key);
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut state = rw_write(&self.state, SOURCE, "set_ex");
        state.values.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let state = rw_read(&self.state, SOURCE, "get");
        Ok(state
            .values
            .get(key)
            .and_then(|stored| stored.live(now))
            .map(str::to_string))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let now = Instant::now();
        let state = rw_read(&self.state, SOURCE, "mget");
        Ok(keys
            .iter()
            .map(|key| {
                state
                    .values
                    .get(key)
                    .and_then(|stored| stored.live(now))
                    .map(str::to_string)
            })
            .collect())
    }
}
