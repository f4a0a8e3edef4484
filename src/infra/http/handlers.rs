use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::NewCommentParams;
use crate::domain::comments::CommentRecord;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ResyncResponse {
    pub synced: usize,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentRecord>), AppError> {
    let record = state
        .comments
        .create_comment(NewCommentParams {
            content: body.content,
            user_id: body.user_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn like_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CommentRecord>, AppError> {
    let record = state.comments.like_comment(id).await?;
    Ok(Json(record))
}

/// The board read is infallible by contract, so this handler has no error
/// branch; degraded backends shrink the page instead.
pub async fn hot_comments(State(state): State<AppState>) -> Json<Vec<CommentRecord>> {
    Json(state.hot.top_comments().await)
}

/// Bridge from the change-event transport. The payload is acknowledged
/// unconditionally; malformed events are dropped inside the consumer.
pub async fn ingest_event(State(state): State<AppState>, payload: Bytes) -> StatusCode {
    state.consumer.handle_payload(&payload).await;
    StatusCode::ACCEPTED
}

pub async fn trigger_resync(
    State(state): State<AppState>,
) -> Result<Json<ResyncResponse>, AppError> {
    let outcome = state.resync.run().await?;
    Ok(Json(ResyncResponse {
        synced: outcome.synced,
    }))
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    match state.db.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::healthz",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::application::comments::CommentService;
    use crate::application::hot::HotCommentsService;
    use crate::cache::{
        CommentSyncConsumer, HotResync, KEY_HOT_COMMENTS, MemoryStore, SyncConfig, detail_key,
    };
    use crate::infra::db::PostgresRepositories;
    use crate::infra::http::build_router;

    use super::*;
    use crate::cache::HotStore;

    fn state_with_store(store: Arc<MemoryStore>) -> AppState {
        // Lazy pool: never connects unless the DB paths are exercised.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/hotboard_test")
            .expect("lazy pool");
        let db = PostgresRepositories::new(pool);
        let repo = Arc::new(db.clone());
        AppState {
            comments: Arc::new(CommentService::new(repo.clone())),
            hot: Arc::new(HotCommentsService::new(store.clone(), repo.clone(), 10)),
            consumer: Arc::new(CommentSyncConsumer::new(
                store.clone(),
                Duration::from_secs(3600),
            )),
            resync: Arc::new(HotResync::new(repo, store, SyncConfig::default())),
            db,
        }
    }

    #[tokio::test]
    async fn event_bridge_accepts_and_applies_payload() {
        let store = Arc::new(MemoryStore::new());
        let app = build_router(state_with_store(store.clone()));

        let payload = concat!(
            r#"{"u":{"id":{"v":7},"content":{"v":"hi"},"user_id":{"v":"u-1"},"#,
            r#""likes":{"v":3},"version":{"v":1},"#,
            r#""created_at":{"v":"2025-06-01 08:00:00"},"#,
            r#""updated_at":{"v":"2025-06-01 08:00:00"}}}"#
        );
        let response = app
            .oneshot(
                Request::post("/internal/events")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let top = store.zrevrange(KEY_HOT_COMMENTS, 0, 9).await.unwrap();
        assert_eq!(top, vec!["7".to_string()]);
    }

    #[tokio::test]
    async fn event_bridge_accepts_malformed_payload_without_applying() {
        let store = Arc::new(MemoryStore::new());
        let app = build_router(state_with_store(store.clone()));

        let response = app
            .oneshot(
                Request::post("/internal/events")
                    .body(Body::from("garbage"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(
            store
                .zrevrange(KEY_HOT_COMMENTS, 0, 9)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn hot_endpoint_serves_cached_page() {
        let store = Arc::new(MemoryStore::new());
        let record = CommentRecord {
            id: 1,
            content: "hi".to_string(),
            user_id: "u-1".to_string(),
            likes: 3,
            version: 1,
            created_at: time::macros::datetime!(2025-06-01 08:00:00 UTC),
            updated_at: time::macros::datetime!(2025-06-01 08:00:00 UTC),
        };
        store.zadd(KEY_HOT_COMMENTS, "1", 3.0).await.unwrap();
        store
            .set_ex(
                &detail_key(1),
                &serde_json::to_string(&record).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let app = build_router(state_with_store(store));
        let response = app
            .oneshot(
                Request::get("/api/comments/hot")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page: Vec<CommentRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 1);
    }
}
