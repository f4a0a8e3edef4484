//! Cache-aside read path for the hot-comments board.

use std::sync::Arc;

use metrics::counter;
use tracing::{error, instrument, warn};

use crate::application::repos::CommentsRepo;
use crate::cache::{HotStore, KEY_HOT_COMMENTS, detail_key};
use crate::domain::comments::CommentRecord;

const METRIC_READ_FALLBACK: &str = "hotboard_read_fallback_total";
const METRIC_READ_SERVED: &str = "hotboard_read_served_total";

/// Serves the top-N board.
///
/// This path never returns an error to its caller: a cold or unreachable
/// cache degrades to the database, and a failing database degrades to an
/// empty board. Partially-expired detail entries are dropped from the page
/// rather than refetched; the next resync restores them.
pub struct HotCommentsService {
    store: Arc<dyn HotStore>,
    repo: Arc<dyn CommentsRepo>,
    top_n: usize,
}

impl HotCommentsService {
    pub fn new(store: Arc<dyn HotStore>, repo: Arc<dyn CommentsRepo>, top_n: usize) -> Self {
        Self { store, repo, top_n }
    }

    #[instrument(skip(self))]
    pub async fn top_comments(&self) -> Vec<CommentRecord> {
        if self.top_n == 0 {
            return Vec::new();
        }

        let members = match self
            .store
            .zrevrange(KEY_HOT_COMMENTS, 0, self.top_n as isize - 1)
            .await
        {
            Ok(members) if !members.is_empty() => members,
            Ok(_) => {
                counter!(METRIC_READ_FALLBACK, "reason" => "empty").increment(1);
                return self.fallback().await;
            }
            Err(err) => {
                counter!(METRIC_READ_FALLBACK, "reason" => "cache_error").increment(1);
                warn!(error = %err, "Ranked index unavailable; falling back to database");
                return self.fallback().await;
            }
        };

        let keys: Vec<String> = members
            .iter()
            .filter_map(|member| member.parse::<i64>().ok())
            .map(detail_key)
            .collect();
        let snapshots = match self.store.mget(&keys).await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                counter!(METRIC_READ_FALLBACK, "reason" => "cache_error").increment(1);
                warn!(error = %err, "Detail cache unavailable; falling back to database");
                return self.fallback().await;
            }
        };

        let mut comments = Vec::with_capacity(snapshots.len());
        for (key, snapshot) in keys.iter().zip(snapshots) {
            let Some(snapshot) = snapshot else {
                // Expired ahead of its index entry; the page just shrinks.
                warn!(key, "Detail snapshot missing for ranked comment");
                continue;
            };
            match serde_json::from_str::<CommentRecord>(&snapshot) {
                Ok(record) => comments.push(record),
                Err(err) => {
                    warn!(key, error = %err, "Detail snapshot corrupt; skipping entry");
                }
            }
        }

        counter!(METRIC_READ_SERVED, "source" => "cache").increment(1);
        comments
    }

    async fn fallback(&self) -> Vec<CommentRecord> {
        match self.repo.find_top_by_likes(self.top_n as i64).await {
            Ok(rows) => {
                counter!(METRIC_READ_SERVED, "source" => "database").increment(1);
                rows
            }
            Err(err) => {
                error!(error = %err, "Database fallback failed; serving empty board");
                Vec::new()
            }
        }
    }
}
