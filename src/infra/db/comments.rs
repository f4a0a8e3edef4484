//! Postgres implementation of the comments repository.

use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{
    CommentUpdate, CommentsRepo, NewCommentParams, RepoError,
};
use crate::domain::comments::CommentRecord;

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str = "id, content, user_id, likes, version, created_at, updated_at";

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    content: String,
    user_id: String,
    likes: i64,
    version: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        CommentRecord {
            id: row.id,
            content: row.content,
            user_id: row.user_id,
            likes: row.likes,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_top_by_likes(&self, limit: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY likes DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_top_liked_since(
        &self,
        since: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE updated_at >= $1 \
             ORDER BY likes DESC, id DESC LIMIT $2"
        ))
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "INSERT INTO comments (content, user_id) VALUES ($1, $2) \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(params.content)
        .bind(params.user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn save_with_version_check(
        &self,
        update: CommentUpdate,
    ) -> Result<CommentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query_as::<_, CommentRow>(&format!(
            "UPDATE comments \
             SET likes = $2, version = version + 1, updated_at = now() \
             WHERE id = $1 AND version = $3 \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(update.id)
        .bind(update.likes)
        .bind(update.expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        match updated {
            Some(row) => {
                tx.commit().await.map_err(map_sqlx_error)?;
                Ok(row.into())
            }
            None => {
                // Zero rows means either the row is gone or someone else
                // committed first; look at the row inside the same
                // transaction to tell the two apart.
                let live_version =
                    sqlx::query_scalar::<_, i64>("SELECT version FROM comments WHERE id = $1")
                        .bind(update.id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                tx.rollback().await.map_err(map_sqlx_error)?;

                match live_version {
                    Some(_) => Err(RepoError::VersionConflict {
                        id: update.id,
                        expected: update.expected_version,
                    }),
                    None => Err(RepoError::NotFound),
                }
            }
        }
    }
}
