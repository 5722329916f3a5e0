//! In-memory cache store.
//!
//! A process-local stand-in for Redis, used by tests and by deployments that
//! run without an external cache. TTLs are honored lazily on read; the scan
//! returns all matching keys in a single round.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::store::{CacheError, CacheStore, ScanPage};

struct Entry {
    value: Vec<u8>,
    ttl: Option<Duration>,
    stored_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.stored_at.elapsed() > ttl)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are always internally consistent, so a poisoned lock is
    // recovered rather than propagated.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All live keys, for inspection in tests.
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries();
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries();
        entries.get(key).is_some_and(|entry| !entry.is_expired())
    }

    /// TTL recorded for a live key: `None` if absent, `Some(None)` if stored
    /// without a TTL.
    pub fn stored_ttl(&self, key: &str) -> Option<Option<Duration>> {
        let entries = self.entries();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl)
    }
}

fn matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut entries = self.entries();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                ttl,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn scan(&self, pattern: &str, _cursor: u64, _batch: u32) -> Result<ScanPage, CacheError> {
        let entries = self.entries();
        let keys = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired() && matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(ScanPage { keys, cursor: 0 })
    }
}
