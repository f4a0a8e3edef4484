//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::comments::CommentRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("version conflict on comment {id}: expected version {expected}")]
    VersionConflict { id: i64, expected: i64 },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub content: String,
    pub user_id: String,
}

/// Write-back of a counter mutation, conditioned on the version the caller
/// read. The store rejects the write when the row has moved on.
#[derive(Debug, Clone, Copy)]
pub struct CommentUpdate {
    pub id: i64,
    pub likes: i64,
    pub expected_version: i64,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;

    /// Top `limit` comments by like-count over the whole table. This is the
    /// read path's fallback query, not the resync query.
    async fn find_top_by_likes(&self, limit: i64) -> Result<Vec<CommentRecord>, RepoError>;

    /// Top `limit` comments by like-count among rows updated at or after
    /// `since`. Feeds the batch resync.
    async fn find_top_liked_since(
        &self,
        since: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError>;

    /// Compare-and-swap write: applies the update only while the row still
    /// carries `expected_version`, bumping the version on success. Returns
    /// `VersionConflict` when another writer got there first and `NotFound`
    /// when the row no longer exists.
    async fn save_with_version_check(
        &self,
        update: CommentUpdate,
    ) -> Result<CommentRecord, RepoError>;
}
