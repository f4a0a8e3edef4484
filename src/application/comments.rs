//! Comment write services: creation and the optimistic like counter.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::error::AppError;
use crate::application::repos::{CommentUpdate, CommentsRepo, NewCommentParams, RepoError};
use crate::domain::comments::CommentRecord;
use crate::domain::error::DomainError;

const MAX_CONTENT_LEN: usize = 4096;

pub struct CommentService {
    repo: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentsRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, AppError> {
        if params.content.trim().is_empty() {
            return Err(DomainError::validation("comment content must not be empty").into());
        }
        if params.content.len() > MAX_CONTENT_LEN {
            return Err(DomainError::validation("comment content too long").into());
        }
        if params.user_id.trim().is_empty() {
            return Err(DomainError::validation("user id must not be empty").into());
        }

        let record = self.repo.create_comment(params).await?;
        info!(comment_id = record.id, "Comment created");
        Ok(record)
    }

    /// Increment the like counter with an explicit compare-and-swap.
    ///
    /// The counter is read together with its version, incremented, and
    /// written back conditioned on that version. A concurrent writer makes
    /// the write-back fail, and the conflict is surfaced to the caller
    /// instead of being retried here; the caller owns the retry policy.
    #[instrument(skip(self))]
    pub async fn like_comment(&self, id: i64) -> Result<CommentRecord, AppError> {
        let current = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment", id))?;

        let update = CommentUpdate {
            id,
            likes: current.likes + 1,
            expected_version: current.version,
        };
        match self.repo.save_with_version_check(update).await {
            Ok(record) => {
                info!(comment_id = id, likes = record.likes, "Like applied");
                Ok(record)
            }
            Err(RepoError::VersionConflict { expected, .. }) => {
                warn!(
                    comment_id = id,
                    expected_version = expected,
                    "Like lost the optimistic race"
                );
                Err(DomainError::conflict("comment", id).into())
            }
            Err(RepoError::NotFound) => Err(DomainError::not_found("comment", id).into()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::RwLock;

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;

    /// In-memory repository enforcing the same version discipline as the
    /// database adapter.
    #[derive(Default)]
    struct VersionedRepo {
        rows: RwLock<HashMap<i64, CommentRecord>>,
        next_id: RwLock<i64>,
    }

    impl VersionedRepo {
        fn with_comment(id: i64, likes: i64, version: i64) -> Self {
            let repo = Self::default();
            repo.rows.write().unwrap().insert(
                id,
                CommentRecord {
                    id,
                    content: "hello".to_string(),
                    user_id: "u-1".to_string(),
                    likes,
                    version,
                    created_at: OffsetDateTime::now_utc(),
                    updated_at: OffsetDateTime::now_utc(),
                },
            );
            repo
        }
    }

    #[async_trait]
    impl CommentsRepo for VersionedRepo {
        async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
            Ok(self.rows.read().unwrap().get(&id).cloned())
        }

        async fn find_top_by_likes(&self, limit: i64) -> Result<Vec<CommentRecord>, RepoError> {
            let mut rows: Vec<_> = self.rows.read().unwrap().values().cloned().collect();
            rows.sort_by(|a, b| b.likes.cmp(&a.likes));
            rows.truncate(limit as usize);
            Ok(rows)
        }

        async fn find_top_liked_since(
            &self,
            _since: OffsetDateTime,
            limit: i64,
        ) -> Result<Vec<CommentRecord>, RepoError> {
            self.find_top_by_likes(limit).await
        }

        async fn create_comment(
            &self,
            params: NewCommentParams,
        ) -> Result<CommentRecord, RepoError> {
            let mut next_id = self.next_id.write().unwrap();
            *next_id += 1;
            let record = CommentRecord {
                id: *next_id,
                content: params.content,
                user_id: params.user_id,
                likes: 0,
                version: 1,
                created_at: OffsetDateTime::now_utc(),
                updated_at: OffsetDateTime::now_utc(),
            };
            self.rows
                .write()
                .unwrap()
                .insert(record.id, record.clone());
            Ok(record)
        }

        async fn save_with_version_check(
            &self,
            update: CommentUpdate,
        ) -> Result<CommentRecord, RepoError> {
            let mut rows = self.rows.write().unwrap();
            let Some(row) = rows.get_mut(&update.id) else {
                return Err(RepoError::NotFound);
            };
            if row.version != update.expected_version {
                return Err(RepoError::VersionConflict {
                    id: update.id,
                    expected: update.expected_version,
                });
            }
            row.likes = update.likes;
            row.version += 1;
            row.updated_at = OffsetDateTime::now_utc();
            Ok(row.clone())
        }
    }

    #[tokio::test]
    async fn like_increments_counter_and_version() {
        let service = CommentService::new(Arc::new(VersionedRepo::with_comment(7, 4, 2)));

        let record = service.like_comment(7).await.unwrap();
        assert_eq!(record.likes, 5);
        assert_eq!(record.version, 3);
    }

    #[tokio::test]
    async fn like_of_missing_comment_is_not_found() {
        let service = CommentService::new(Arc::new(VersionedRepo::default()));
        let err = service.like_comment(99).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::NotFound { id: 99, .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_like_surfaces_conflict_and_loses_no_update() {
        let repo = Arc::new(VersionedRepo::with_comment(7, 0, 1));
        let service = CommentService::new(repo.clone());

        // Both callers read version 1; one write-back must fail.
        let first = service.repo.find_by_id(7).await.unwrap().unwrap();
        let winning = repo
            .save_with_version_check(CommentUpdate {
                id: 7,
                likes: first.likes + 1,
                expected_version: first.version,
            })
            .await
            .unwrap();
        assert_eq!(winning.likes, 1);

        let losing = repo
            .save_with_version_check(CommentUpdate {
                id: 7,
                likes: first.likes + 1,
                expected_version: first.version,
            })
            .await;
        assert!(matches!(
            losing,
            Err(RepoError::VersionConflict { id: 7, expected: 1 })
        ));

        // The service maps the conflict onto the domain error.
        let row = repo.rows.read().unwrap().get(&7).cloned().unwrap();
        assert_eq!(row.likes, 1);
        let retried = service.like_comment(7).await.unwrap();
        assert_eq!(retried.likes, 2);
    }

    #[tokio::test]
    async fn create_rejects_blank_content() {
        let service = CommentService::new(Arc::new(VersionedRepo::default()));
        let err = service
            .create_comment(NewCommentParams {
                content: "   ".to_string(),
                user_id: "u-1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Domain(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn create_assigns_initial_version() {
        let service = CommentService::new(Arc::new(VersionedRepo::default()));
        let record = service
            .create_comment(NewCommentParams {
                content: "first!".to_string(),
                user_id: "u-1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(record.likes, 0);
        assert_eq!(record.version, 1);
    }
}
