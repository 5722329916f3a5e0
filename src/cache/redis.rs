//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::store::{CacheError, CacheStore, ScanPage};

/// Cache store over one multiplexed Redis connection.
///
/// The connection manager reconnects on its own; individual command failures
/// surface as `CacheError::Backend` and are handled by the caller's
/// degrade-to-database policy.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(CacheError::backend)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .pset_ex(key, value, ttl_millis(ttl))
                    .await
                    .map_err(CacheError::backend)?;
            }
            None => {
                let _: () = conn.set(key, value).await.map_err(CacheError::backend)?;
            }
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await.map_err(CacheError::backend)?;
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64, batch: u32) -> Result<ScanPage, CacheError> {
        let mut conn = self.conn.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(ScanPage { keys, cursor })
    }
}

/// PSETEX keeps sub-second remainders exact, so an entry never outlives its
/// bounded TTL by a rounding step. It rejects 0; anything below one
/// millisecond is bumped to one.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
