//! Cache key conventions.
//!
//! The live ranked index and its staging twin are fixed well-known keys;
//! detail snapshots are keyed per comment id.

/// Live ranked index: comment id -> like-count score.
pub const KEY_HOT_COMMENTS: &str = "hot_comments";

/// Staging ranked index written by the resync job. Invisible to readers
/// until it is renamed over [`KEY_HOT_COMMENTS`].
pub const KEY_HOT_COMMENTS_STAGING: &str = "hot_comments_staging";

const DETAIL_PREFIX: &str = "comment:";

/// Detail-cache key for one comment.
pub fn detail_key(id: i64) -> String {
    format!("{DETAIL_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_key_uses_id_suffix() {
        assert_eq!(detail_key(42), "comment:42");
    }

    #[test]
    fn staging_key_differs_from_live() {
        assert_ne!(KEY_HOT_COMMENTS, KEY_HOT_COMMENTS_STAGING);
    }
}
