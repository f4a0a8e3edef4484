//! HTTP surface: the public comments API plus internal sync endpoints.

mod handlers;
mod middleware;

pub use middleware::log_responses;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::comments::CommentService;
use crate::application::hot::HotCommentsService;
use crate::cache::{CommentSyncConsumer, HotResync};
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct AppState {
    pub comments: Arc<CommentService>,
    pub hot: Arc<HotCommentsService>,
    pub consumer: Arc<CommentSyncConsumer>,
    pub resync: Arc<HotResync>,
    pub db: PostgresRepositories,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/comments", post(handlers::create_comment))
        .route("/api/comments/{id}/like", post(handlers::like_comment))
        .route("/api/comments/hot", get(handlers::hot_comments))
        .route("/internal/events", post(handlers::ingest_event))
        .route("/internal/resync", post(handlers::trigger_resync))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
}
