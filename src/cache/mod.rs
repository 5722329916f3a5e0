//! snipbin cache system.
//!
//! A cache-aside layer over the durable snippet repository:
//!
//! - single items live under `snippet:{id}` with a TTL bounded by the
//!   snippet's own expiry,
//! - list pages live under `snippets:{page}:{limit}[:{tag}]` with the
//!   configured default TTL,
//! - every write invalidates the whole list namespace via bounded SCAN
//!   rounds.
//!
//! Cache failures never fail a request: writes stay durable, reads fall
//! through to the database.

pub mod keys;
mod memory;
mod redis;
mod repo;
mod store;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use repo::{CacheConfig, CachedSnippetRepo};
pub use store::{CacheError, CacheStore, ScanPage};
