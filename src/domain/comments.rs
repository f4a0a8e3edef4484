//! The comment entity mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Authoritative comment record.
///
/// `version` increases strictly with every committed write; a write that
/// presents a stale version is rejected by the repository. `created_at` is
/// set once at insertion, `updated_at` moves on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub content: String,
    pub user_id: String,
    pub likes: i64,
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
