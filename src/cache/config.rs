//! Tunables for the synchronization paths.

use std::time::Duration;

const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_BATCH_LIMIT: i64 = 1000;
const DEFAULT_DETAIL_TTL_SECS: u64 = 60 * 60;
const DEFAULT_TOP_N: usize = 10;

/// Configuration shared by the consumer, the resync job, and the read path.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Trailing window of `updated_at` considered by the batch resync.
    pub window_days: u32,
    /// Maximum number of rows the batch resync pulls per run.
    pub batch_limit: i64,
    /// Time-to-live for detail-cache snapshots.
    pub detail_ttl: Duration,
    /// Default size of the served hot list.
    pub top_n: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            batch_limit: DEFAULT_BATCH_LIMIT,
            detail_ttl: Duration::from_secs(DEFAULT_DETAIL_TTL_SECS),
            top_n: DEFAULT_TOP_N,
        }
    }
}
