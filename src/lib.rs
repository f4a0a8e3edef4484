//! Hotboard keeps a ranked "hot comments" view in a Redis-style store,
//! synchronized from the authoritative database through two independent
//! paths: an incremental change-event consumer and a periodic full resync
//! with atomic cutover. Reads degrade to the database whenever the cache
//! is empty, inconsistent, or unreachable.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
