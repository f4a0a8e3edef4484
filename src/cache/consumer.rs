//! Incremental sync: applies translated change events to the live cache.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, error, info, instrument, warn};

use super::events::{ChangeEvent, translate};
use super::keys::{KEY_HOT_COMMENTS, detail_key};
use super::store::{CacheError, HotStore};

const METRIC_EVENTS_APPLIED: &str = "hotboard_events_applied_total";
const METRIC_EVENTS_DROPPED: &str = "hotboard_events_dropped_total";

/// Applies change events to the ranked index and detail cache.
///
/// The entry point never fails: malformed payloads and cache-store outages
/// are logged and absorbed so the transport can always acknowledge progress.
/// Events are applied idempotently, tolerating at-least-once redelivery;
/// per-identifier ordering is the transport's guarantee, not enforced here.
pub struct CommentSyncConsumer {
    store: Arc<dyn HotStore>,
    detail_ttl: Duration,
}

impl CommentSyncConsumer {
    pub fn new(store: Arc<dyn HotStore>, detail_ttl: Duration) -> Self {
        Self { store, detail_ttl }
    }

    /// Consume one transport payload.
    ///
    /// Translation failures and cache failures are terminal for the event
    /// but never for the stream: the caller acknowledges regardless.
    #[instrument(skip_all, fields(payload_len = payload.len()))]
    pub async fn handle_payload(&self, payload: &[u8]) {
        let event = match translate(payload) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("Heartbeat payload ignored");
                return;
            }
            Err(err) => {
                counter!(METRIC_EVENTS_DROPPED, "reason" => "malformed").increment(1);
                warn!(
                    error = %err,
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping malformed change event"
                );
                return;
            }
        };

        if let Err(err) = self.apply(&event).await {
            counter!(METRIC_EVENTS_DROPPED, "reason" => "cache").increment(1);
            error!(
                error = %err,
                event = ?event_id(&event),
                "Cache write failed; event dropped, next event or resync will repair"
            );
        }
    }

    /// Apply one event to the cache. Idempotent: replaying an event leaves
    /// the same index score and detail snapshot behind.
    pub async fn apply(&self, event: &ChangeEvent) -> Result<(), CacheError> {
        match event {
            ChangeEvent::Upsert(comment) => {
                self.store
                    .zadd(
                        KEY_HOT_COMMENTS,
                        &comment.id.to_string(),
                        comment.likes as f64,
                    )
                    .await?;

                let snapshot =
                    serde_json::to_string(comment).map_err(CacheError::backend)?;
                self.store
                    .set_ex(&detail_key(comment.id), &snapshot, self.detail_ttl)
                    .await?;

                counter!(METRIC_EVENTS_APPLIED, "kind" => "upsert").increment(1);
                info!(
                    comment_id = comment.id,
                    likes = comment.likes,
                    "Applied upsert to ranked index and detail cache"
                );
            }
            ChangeEvent::Delete(id) => {
                self.store
                    .zrem(KEY_HOT_COMMENTS, &id.to_string())
                    .await?;
                self.store.del(&detail_key(*id)).await?;

                counter!(METRIC_EVENTS_APPLIED, "kind" => "delete").increment(1);
                info!(comment_id = id, "Removed comment from ranked index and detail cache");
            }
        }
        Ok(())
    }
}

fn event_id(event: &ChangeEvent) -> i64 {
    match event {
        ChangeEvent::Upsert(comment) => comment.id,
        ChangeEvent::Delete(id) => *id,
    }
}
