//! The volatile key-value store contract.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// One round of a cursor-based key enumeration. A zero cursor means the scan
/// is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: u64,
}

/// Raw byte-oriented cache operations.
///
/// Implementations must be safe to share across request handlers; the
/// production variant wraps one multiplexed Redis connection.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value. `None` means no TTL; the entry lives until invalidated.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Enumerate keys matching `pattern`, at most roughly `batch` per round.
    /// Start with cursor 0 and keep calling until the returned cursor is 0.
    async fn scan(&self, pattern: &str, cursor: u64, batch: u32) -> Result<ScanPage, CacheError>;
}
