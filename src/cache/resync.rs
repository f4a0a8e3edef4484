//! Batch resync: rebuilds the ranked index from the database and swaps it
//! into place with an atomic rename.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument};

use crate::application::repos::{CommentsRepo, RepoError};

use super::config::SyncConfig;
use super::keys::{KEY_HOT_COMMENTS, KEY_HOT_COMMENTS_STAGING, detail_key};
use super::store::{CacheError, HotStore};

const METRIC_RESYNC_MS: &str = "hotboard_resync_ms";
const METRIC_RESYNC_ROWS: &str = "hotboard_resync_rows_total";

#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("resync source query failed: {0}")]
    Repo(#[from] RepoError),
    #[error("resync cache write failed: {0}")]
    Cache(#[from] CacheError),
    #[error("resync snapshot serialization failed for comment {id}: {message}")]
    Serialize { id: i64, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncOutcome {
    /// Number of rows written into the new ranking. Zero means the source
    /// window was empty and the live index was left as-is.
    pub synced: usize,
}

/// Rebuilds the hot ranking from the source of truth.
///
/// The rebuild happens against a staging index the read path never touches;
/// the final rename is the only operation that changes what readers see.
/// Any failure before the rename leaves the previously-live ranking intact,
/// and the error is surfaced to the external trigger for its retry policy.
pub struct HotResync {
    repo: Arc<dyn CommentsRepo>,
    store: Arc<dyn HotStore>,
    config: SyncConfig,
}

impl HotResync {
    pub fn new(repo: Arc<dyn CommentsRepo>, store: Arc<dyn HotStore>, config: SyncConfig) -> Self {
        Self {
            repo,
            store,
            config,
        }
    }

    /// Run one full resync cycle.
    ///
    /// An event applied to the live index between the source query and the
    /// rename is lost at cutover; the gap is bounded by the resync cadence
    /// and repaired by the next incremental event or cycle.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<ResyncOutcome, ResyncError> {
        let started_at = Instant::now();
        let since =
            OffsetDateTime::now_utc() - TimeDuration::days(i64::from(self.config.window_days));

        let rows = self
            .repo
            .find_top_liked_since(since, self.config.batch_limit)
            .await?;
        if rows.is_empty() {
            info!(
                window_days = self.config.window_days,
                "No comments in the resync window; live ranking left untouched"
            );
            return Ok(ResyncOutcome { synced: 0 });
        }

        self.store.del(KEY_HOT_COMMENTS_STAGING).await?;
        for comment in &rows {
            self.store
                .zadd(
                    KEY_HOT_COMMENTS_STAGING,
                    &comment.id.to_string(),
                    comment.likes as f64,
                )
                .await?;

            // Detail freshness is not gated by the cutover: a partial run
            // still leaves partially-fresh snapshots behind, which is fine.
            let snapshot =
                serde_json::to_string(comment).map_err(|err| ResyncError::Serialize {
                    id: comment.id,
                    message: err.to_string(),
                })?;
            self.store
                .set_ex(&detail_key(comment.id), &snapshot, self.config.detail_ttl)
                .await?;
        }

        // Cutover: readers observe the old ranking or the new one, never a mix.
        self.store
            .rename(KEY_HOT_COMMENTS_STAGING, KEY_HOT_COMMENTS)
            .await?;

        counter!(METRIC_RESYNC_ROWS).increment(rows.len() as u64);
        histogram!(METRIC_RESYNC_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(synced = rows.len(), "Hot ranking resynced and cut over");

        Ok(ResyncOutcome { synced: rows.len() })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use time::macros::datetime;

    use crate::application::repos::{CommentUpdate, NewCommentParams};
    use crate::cache::MemoryStore;
    use crate::domain::comments::CommentRecord;

    use super::*;

    struct StubRepo {
        rows: Vec<CommentRecord>,
        fail: bool,
    }

    #[async_trait]
    impl CommentsRepo for StubRepo {
        async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
            Ok(self.rows.iter().find(|c| c.id == id).cloned())
        }

        async fn find_top_by_likes(&self, limit: i64) -> Result<Vec<CommentRecord>, RepoError> {
            let mut rows = self.rows.clone();
            rows.sort_by(|a, b| b.likes.cmp(&a.likes));
            rows.truncate(limit as usize);
            Ok(rows)
        }

        async fn find_top_liked_since(
            &self,
            _since: OffsetDateTime,
            limit: i64,
        ) -> Result<Vec<CommentRecord>, RepoError> {
            if self.fail {
                return Err(RepoError::Timeout);
            }
            self.find_top_by_likes(limit).await
        }

        async fn create_comment(
            &self,
            _params: NewCommentParams,
        ) -> Result<CommentRecord, RepoError> {
            Err(RepoError::from_persistence("not supported in stub"))
        }

        async fn save_with_version_check(
            &self,
            _update: CommentUpdate,
        ) -> Result<CommentRecord, RepoError> {
            Err(RepoError::from_persistence("not supported in stub"))
        }
    }

    fn comment(id: i64, likes: i64) -> CommentRecord {
        CommentRecord {
            id,
            content: format!("comment {id}"),
            user_id: "u-1".to_string(),
            likes,
            version: 1,
            created_at: datetime!(2025-06-01 08:00:00 UTC),
            updated_at: datetime!(2025-06-01 08:00:00 UTC),
        }
    }

    fn resync_with(rows: Vec<CommentRecord>, fail: bool) -> (HotResync, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let resync = HotResync::new(
            Arc::new(StubRepo { rows, fail }),
            store.clone(),
            SyncConfig::default(),
        );
        (resync, store)
    }

    #[tokio::test]
    async fn empty_window_is_a_successful_noop() {
        let (resync, store) = resync_with(Vec::new(), false);
        store.zadd(KEY_HOT_COMMENTS, "1", 5.0).await.unwrap();

        let outcome = resync.run().await.unwrap();
        assert_eq!(outcome.synced, 0);

        // Pre-existing live ranking survives an empty run.
        let live = store.zrevrange(KEY_HOT_COMMENTS, 0, 9).await.unwrap();
        assert_eq!(live, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn resync_builds_ranking_and_details() {
        let (resync, store) = resync_with(vec![comment(42, 5), comment(2, 9)], false);

        let outcome = resync.run().await.unwrap();
        assert_eq!(outcome.synced, 2);

        let live = store.zrevrange(KEY_HOT_COMMENTS, 0, 9).await.unwrap();
        assert_eq!(live, vec!["2".to_string(), "42".to_string()]);

        let snapshot = store.get(&detail_key(42)).await.unwrap().expect("detail");
        let record: CommentRecord = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(record.likes, 5);

        // Staging key is gone after the rename.
        assert!(
            store
                .zrevrange(KEY_HOT_COMMENTS_STAGING, 0, 9)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn cutover_replaces_stale_live_ranking_entirely() {
        let (resync, store) = resync_with(vec![comment(10, 3)], false);
        store.zadd(KEY_HOT_COMMENTS, "999", 50.0).await.unwrap();

        resync.run().await.unwrap();

        let live = store.zrevrange(KEY_HOT_COMMENTS, 0, 9).await.unwrap();
        assert_eq!(live, vec!["10".to_string()]);
    }

    #[tokio::test]
    async fn source_failure_leaves_live_ranking_untouched() {
        let (resync, store) = resync_with(vec![comment(10, 3)], true);
        store.zadd(KEY_HOT_COMMENTS, "1", 5.0).await.unwrap();

        let err = resync.run().await.unwrap_err();
        assert!(matches!(err, ResyncError::Repo(RepoError::Timeout)));

        let live = store.zrevrange(KEY_HOT_COMMENTS, 0, 9).await.unwrap();
        assert_eq!(live, vec!["1".to_string()]);
    }
}
