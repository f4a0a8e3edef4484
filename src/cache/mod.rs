//! Hotboard cache synchronization.
//!
//! Two independent paths keep the ranked view consistent with the database:
//!
//! - **Incremental**: [`CommentSyncConsumer`] applies translated change
//!   events to the live ranked index and detail cache as they arrive.
//! - **Batch**: [`HotResync`] rebuilds the ranking into a staging index and
//!   atomically renames it over the live one.
//!
//! Neither path locks out the other; correctness rests on the store's atomic
//! rename and on idempotent per-record writes.

mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod memory;
mod resync;
mod store;

pub use config::SyncConfig;
pub use consumer::CommentSyncConsumer;
pub use events::{ChangeEvent, TranslateError, translate};
pub use keys::{KEY_HOT_COMMENTS, KEY_HOT_COMMENTS_STAGING, detail_key};
pub use memory::MemoryStore;
pub use resync::{HotResync, ResyncError, ResyncOutcome};
pub use store::{CacheError, HotStore, RedisStore};
