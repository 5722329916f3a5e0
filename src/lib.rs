//! snipbin: a snippet store with a cache-aside layer between Postgres and Redis.
//!
//! Reads go cache → (miss) → database → repopulate; writes go database first,
//! then best-effort cache population and list invalidation. The cache is never
//! authoritative: every operation degrades to database-only behavior when the
//! cache is unreachable.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
