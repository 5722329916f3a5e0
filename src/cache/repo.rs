//! Cache-aside decorator over a durable snippet repository.
//!
//! Write path: durable store first; only after the write is durable are the
//! single-item entry and the list namespace touched, and both of those are
//! best-effort. Read path: cache probe, falling through to the durable store
//! on a miss, a decode failure, or any cache error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::clock::Clock;
use crate::application::pagination::ListQuery;
use crate::application::repos::{Fetched, RepoError, SnippetRepo};
use crate::domain::snippets::Snippet;

use super::keys;
use super::store::CacheStore;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for list pages and the ceiling for single items. `None` stores
    /// entries without a TTL.
    pub default_ttl: Option<Duration>,
    /// COUNT hint per SCAN round during list invalidation.
    pub scan_batch: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(600)),
            scan_batch: 100,
        }
    }
}

/// TTL for a single-item entry, bounded by the snippet's own expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemTtl {
    Cache(Option<Duration>),
    /// Already past expiry; caching would serve a logically dead value.
    Skip,
}

fn bounded_ttl(
    default_ttl: Option<Duration>,
    expires_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> ItemTtl {
    let Some(at) = expires_at else {
        return ItemTtl::Cache(default_ttl);
    };
    if at <= now {
        return ItemTtl::Skip;
    }
    let remaining = Duration::try_from(at - now).unwrap_or(Duration::ZERO);
    match default_ttl {
        Some(default) if default <= remaining => ItemTtl::Cache(Some(default)),
        _ => ItemTtl::Cache(Some(remaining)),
    }
}

pub struct CachedSnippetRepo<R> {
    inner: R,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl<R: SnippetRepo> CachedSnippetRepo<R> {
    pub fn new(
        inner: R,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner,
            cache,
            clock,
            config,
        }
    }

    /// Best-effort single-item population. Never fails the caller; durability
    /// was already achieved by the time this runs.
    async fn populate_item(&self, snippet: &Snippet) {
        let ttl = match bounded_ttl(self.config.default_ttl, snippet.expires_at, self.clock.now()) {
            ItemTtl::Cache(ttl) => ttl,
            ItemTtl::Skip => return,
        };
        let payload = match serde_json::to_vec(snippet) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(id = %snippet.id, error = %err, "failed to encode snippet for cache");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .set(&keys::item_key(snippet.id), &payload, ttl)
            .await
        {
            warn!(id = %snippet.id, error = %err, "failed to populate snippet cache entry");
        }
    }

    /// Best-effort list-page population with the default TTL.
    async fn populate_list(&self, key: &str, snippets: &[Snippet]) {
        let payload = match serde_json::to_vec(snippets) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "failed to encode list page for cache");
                return;
            }
        };
        if let Err(err) = self.cache.set(key, &payload, self.config.default_ttl).await {
            warn!(key, error = %err, "failed to populate list cache entry");
        }
    }

    /// Drop every list-shaped key. Runs after any write; an error aborts this
    /// pass and is logged, never propagated to the write that triggered it.
    async fn invalidate_lists(&self) {
        if let Err(err) = self.try_invalidate_lists().await {
            warn!(error = %err, "list cache invalidation aborted");
        }
    }

    async fn try_invalidate_lists(&self) -> Result<(), super::store::CacheError> {
        let mut cursor = 0;
        let mut removed = 0u64;
        loop {
            let page = self
                .cache
                .scan(keys::LIST_SCAN_PATTERN, cursor, self.config.scan_batch)
                .await?;
            // The pattern alone is not trusted: item keys share a near-prefix
            // with list keys and must never be swept here.
            let doomed: Vec<String> = page
                .keys
                .into_iter()
                .filter(|key| keys::is_list_key(key))
                .collect();
            if !doomed.is_empty() {
                removed += doomed.len() as u64;
                self.cache.delete(&doomed).await?;
            }
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
        counter!("snipbin_cache_list_invalidated_keys_total").increment(removed);
        debug!(removed, "invalidated list cache namespace");
        Ok(())
    }
}

#[async_trait]
impl<R: SnippetRepo> SnippetRepo for CachedSnippetRepo<R> {
    async fn insert(&self, snippet: &Snippet) -> Result<(), RepoError> {
        self.inner.insert(snippet).await?;
        self.populate_item(snippet).await;
        self.invalidate_lists().await;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Fetched, RepoError> {
        let key = keys::item_key(id);
        match self.cache.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_slice::<Snippet>(&payload) {
                Ok(snippet) => {
                    counter!("snipbin_cache_hit_total").increment(1);
                    return Ok(Fetched::from_cache(snippet));
                }
                Err(err) => {
                    // Corrupt payload downgrades to a miss.
                    warn!(%id, error = %err, "discarding undecodable cache entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(%id, error = %err, "cache read failed; falling through to store");
            }
        }
        counter!("snipbin_cache_miss_total").increment(1);

        let fetched = self.inner.find_by_id(id).await?;
        self.populate_item(&fetched.snippet).await;
        Ok(fetched)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Snippet>, RepoError> {
        let key = keys::list_key(query);
        match self.cache.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_slice::<Vec<Snippet>>(&payload) {
                Ok(snippets) => {
                    counter!("snipbin_cache_hit_total").increment(1);
                    return Ok(snippets);
                }
                Err(err) => {
                    warn!(key, error = %err, "discarding undecodable list cache entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(key, error = %err, "cache read failed; falling through to store");
            }
        }
        counter!("snipbin_cache_miss_total").increment(1);

        let now = self.clock.now();
        // Guard against rows that expired between write and read, and pin the
        // ordering regardless of what the store returned.
        let mut snippets: Vec<Snippet> = self
            .inner
            .list(query)
            .await?
            .into_iter()
            .filter(|snippet| snippet.is_listable(now))
            .collect();
        snippets.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.populate_list(&key, &snippets).await;
        Ok(snippets)
    }

    async fn update(&self, snippet: &Snippet) -> Result<(), RepoError> {
        self.inner.update(snippet).await?;
        // Delete rather than rewrite: the next read re-derives from the store
        // instead of racing a concurrent writer's in-flight value.
        if let Err(err) = self.cache.delete(&[keys::item_key(snippet.id)]).await {
            warn!(id = %snippet.id, error = %err, "failed to drop snippet cache entry");
        }
        self.invalidate_lists().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use time::macros::datetime;

    use crate::application::clock::ManualClock;
    use crate::application::pagination::PageLimits;
    use crate::application::repos::FetchSource;
    use crate::cache::memory::MemoryStore;
    use crate::cache::store::{CacheError, ScanPage};
    use crate::infra::memory::MemorySnippetRepo;

    use super::*;

    const START: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    fn snippet(content: &str, created_at: OffsetDateTime) -> Snippet {
        Snippet {
            id: Uuid::new_v4(),
            content: content.to_string(),
            tags: Vec::new(),
            created_at,
            expires_at: None,
        }
    }

    fn query(page: i64, limit: i64, tag: Option<&str>) -> ListQuery {
        ListQuery::normalized(
            page,
            limit,
            tag.map(str::to_string),
            &PageLimits::default(),
        )
    }

    fn cached_repo(
        store: Arc<dyn CacheStore>,
    ) -> (CachedSnippetRepo<MemorySnippetRepo>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let repo = CachedSnippetRepo::new(
            MemorySnippetRepo::new(),
            store,
            clock.clone(),
            CacheConfig::default(),
        );
        (repo, clock)
    }

    // ------------------------------------------------------------------
    // TTL bounding
    // ------------------------------------------------------------------

    #[test]
    fn ttl_without_expiry_uses_the_default() {
        let ttl = bounded_ttl(Some(Duration::from_secs(600)), None, START);
        assert_eq!(ttl, ItemTtl::Cache(Some(Duration::from_secs(600))));
    }

    #[test]
    fn ttl_shrinks_to_time_remaining() {
        let at = START + time::Duration::seconds(30);
        let ttl = bounded_ttl(Some(Duration::from_secs(600)), Some(at), START);
        assert_eq!(ttl, ItemTtl::Cache(Some(Duration::from_secs(30))));
    }

    #[test]
    fn ttl_keeps_the_default_when_expiry_is_further_out() {
        let at = START + time::Duration::hours(2);
        let ttl = bounded_ttl(Some(Duration::from_secs(600)), Some(at), START);
        assert_eq!(ttl, ItemTtl::Cache(Some(Duration::from_secs(600))));
    }

    #[test]
    fn unset_default_still_bounds_by_expiry() {
        let at = START + time::Duration::seconds(45);
        let ttl = bounded_ttl(None, Some(at), START);
        assert_eq!(ttl, ItemTtl::Cache(Some(Duration::from_secs(45))));
        assert_eq!(bounded_ttl(None, None, START), ItemTtl::Cache(None));
    }

    #[test]
    fn already_expired_items_are_never_cached() {
        assert_eq!(
            bounded_ttl(Some(Duration::from_secs(600)), Some(START), START),
            ItemTtl::Skip
        );
    }

    // ------------------------------------------------------------------
    // Read-through / write-through behavior
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn insert_populates_the_item_entry_with_a_bounded_ttl() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store.clone());

        let mut short_lived = snippet("soon gone", START);
        short_lived.expires_at = Some(START + time::Duration::seconds(30));
        repo.insert(&short_lived).await.expect("inserted");

        let ttl = store
            .stored_ttl(&keys::item_key(short_lived.id))
            .expect("item entry present");
        assert_eq!(ttl, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn cache_hit_skips_the_durable_store() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store);

        let snippet = snippet("cached", START);
        repo.insert(&snippet).await.expect("inserted");
        let reads_after_insert = repo.inner.read_count();

        let fetched = repo.find_by_id(snippet.id).await.expect("fetched");
        assert_eq!(fetched.source, FetchSource::Cache);
        assert_eq!(fetched.snippet, snippet);
        assert_eq!(repo.inner.read_count(), reads_after_insert);
    }

    #[tokio::test]
    async fn miss_falls_through_and_repopulates() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store.clone());

        let snippet = snippet("durable", START);
        repo.inner.insert(&snippet).await.expect("seeded directly");
        assert!(!store.contains(&keys::item_key(snippet.id)));

        let fetched = repo.find_by_id(snippet.id).await.expect("fetched");
        assert_eq!(fetched.source, FetchSource::Store);
        assert!(store.contains(&keys::item_key(snippet.id)));

        let again = repo.find_by_id(snippet.id).await.expect("fetched again");
        assert_eq!(again.source, FetchSource::Cache);
    }

    #[tokio::test]
    async fn corrupt_payload_reads_as_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store.clone());

        let snippet = snippet("clean", START);
        repo.insert(&snippet).await.expect("inserted");
        store
            .set(&keys::item_key(snippet.id), b"not json", None)
            .await
            .expect("poisoned entry");

        let fetched = repo.find_by_id(snippet.id).await.expect("fetched");
        assert_eq!(fetched.source, FetchSource::Store);
        assert_eq!(fetched.snippet, snippet);
    }

    #[tokio::test]
    async fn absent_rows_propagate_not_found() {
        let (repo, _clock) = cached_repo(Arc::new(MemoryStore::new()));
        let err = repo.find_by_id(Uuid::new_v4()).await.expect_err("absent");
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn update_drops_the_item_entry_instead_of_rewriting_it() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store.clone());

        let mut snippet = snippet("v1", START);
        repo.insert(&snippet).await.expect("inserted");
        assert!(store.contains(&keys::item_key(snippet.id)));

        snippet.content = "v2".to_string();
        repo.update(&snippet).await.expect("updated");
        assert!(!store.contains(&keys::item_key(snippet.id)));

        let fetched = repo.find_by_id(snippet.id).await.expect("fetched");
        assert_eq!(fetched.snippet.content, "v2");
        assert_eq!(fetched.source, FetchSource::Store);
    }

    // ------------------------------------------------------------------
    // List caching and invalidation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn list_pages_are_cached_under_their_composite_key() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store.clone());

        let snippet = snippet("listed", START);
        repo.inner.insert(&snippet).await.expect("seeded");

        let query = query(1, 10, None);
        let listed = repo.list(&query).await.expect("listed");
        assert_eq!(listed.len(), 1);
        assert!(store.contains("snippets:1:10"));
        assert_eq!(
            store.stored_ttl("snippets:1:10"),
            Some(Some(Duration::from_secs(600)))
        );
    }

    #[tokio::test]
    async fn list_reorders_whatever_the_store_returns() {
        struct ShuffledRepo {
            rows: Vec<Snippet>,
        }

        #[async_trait]
        impl SnippetRepo for ShuffledRepo {
            async fn insert(&self, _snippet: &Snippet) -> Result<(), RepoError> {
                Ok(())
            }
            async fn find_by_id(&self, _id: Uuid) -> Result<Fetched, RepoError> {
                Err(RepoError::NotFound)
            }
            async fn list(&self, _query: &ListQuery) -> Result<Vec<Snippet>, RepoError> {
                Ok(self.rows.clone())
            }
            async fn update(&self, _snippet: &Snippet) -> Result<(), RepoError> {
                Ok(())
            }
        }

        let oldest = snippet("oldest", START - time::Duration::hours(2));
        let middle = snippet("middle", START - time::Duration::hours(1));
        let newest = snippet("newest", START);
        let inner = ShuffledRepo {
            rows: vec![middle.clone(), newest.clone(), oldest.clone()],
        };
        let repo = CachedSnippetRepo::new(
            inner,
            Arc::new(MemoryStore::new()) as Arc<dyn CacheStore>,
            Arc::new(ManualClock::new(START)),
            CacheConfig::default(),
        );

        let listed = repo.list(&query(1, 10, None)).await.expect("listed");
        let ids: Vec<_> = listed.iter().map(|snippet| snippet.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    }

    #[tokio::test]
    async fn list_filters_rows_already_past_expiry() {
        let store = Arc::new(MemoryStore::new());
        let (repo, clock) = cached_repo(store);

        let alive = snippet("alive", START);
        let mut dead = snippet("dead", START);
        dead.expires_at = Some(START + time::Duration::seconds(10));
        repo.inner.insert(&alive).await.expect("seeded");
        repo.inner.insert(&dead).await.expect("seeded");

        clock.advance(time::Duration::seconds(10));
        let listed = repo.list(&query(1, 10, None)).await.expect("listed");
        let ids: Vec<_> = listed.iter().map(|snippet| snippet.id).collect();
        assert_eq!(ids, vec![alive.id]);
    }

    #[tokio::test]
    async fn writes_sweep_every_list_key_but_no_item_keys() {
        let store = Arc::new(MemoryStore::new());
        let (repo, _clock) = cached_repo(store.clone());

        for (page, tag) in [(1, None), (2, None), (1, Some("go"))] {
            let q = query(page, 10, tag);
            repo.list(&q).await.expect("listed");
        }
        assert_eq!(
            store.keys().iter().filter(|k| keys::is_list_key(k)).count(),
            3
        );

        let snippet = snippet("new arrival", START);
        repo.insert(&snippet).await.expect("inserted");

        let remaining = store.keys();
        assert!(remaining.iter().all(|key| !keys::is_list_key(key)));
        assert!(remaining.contains(&keys::item_key(snippet.id)));
    }

    #[tokio::test]
    async fn invalidation_walks_every_scan_round() {
        /// Hands out one key per round to force multiple cursor iterations.
        struct PagedStore {
            inner: MemoryStore,
            rounds: AtomicU64,
        }

        #[async_trait]
        impl CacheStore for PagedStore {
            async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
                self.inner.get(key).await
            }
            async fn set(
                &self,
                key: &str,
                value: &[u8],
                ttl: Option<Duration>,
            ) -> Result<(), CacheError> {
                self.inner.set(key, value, ttl).await
            }
            async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
                self.inner.delete(keys).await
            }
            async fn scan(
                &self,
                pattern: &str,
                _cursor: u64,
                _batch: u32,
            ) -> Result<ScanPage, CacheError> {
                self.rounds.fetch_add(1, Ordering::SeqCst);
                let mut keys = self.inner.scan(pattern, 0, u32::MAX).await?.keys;
                keys.sort();
                keys.truncate(1);
                let cursor = if keys.is_empty() { 0 } else { 1 };
                Ok(ScanPage { keys, cursor })
            }
        }

        let store = Arc::new(PagedStore {
            inner: MemoryStore::new(),
            rounds: AtomicU64::new(0),
        });
        for key in ["snippets:1:10", "snippets:2:10", "snippets:1:10:go"] {
            store.inner.set(key, b"[]", None).await.expect("seeded");
        }

        let (repo, _clock) = cached_repo(store.clone());
        repo.insert(&snippet("trigger", START)).await.expect("inserted");

        assert!(store.inner.keys().iter().all(|key| !keys::is_list_key(key)));
        // Three single-key rounds plus the empty round that ends the scan.
        assert_eq!(store.rounds.load(Ordering::SeqCst), 4);
    }

    // ------------------------------------------------------------------
    // Degradation when the cache is unreachable
    // ------------------------------------------------------------------

    /// Every operation fails, as if the cache node is down.
    struct UnavailableStore {
        calls: Mutex<Vec<&'static str>>,
    }

    impl UnavailableStore {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, op: &'static str) -> Result<(), CacheError> {
            self.calls.lock().expect("calls lock").push(op);
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[async_trait]
    impl CacheStore for UnavailableStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.record("get").map(|_| None)
        }
        async fn set(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            self.record("set")
        }
        async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
            self.record("delete")
        }
        async fn scan(
            &self,
            _pattern: &str,
            _cursor: u64,
            _batch: u32,
        ) -> Result<ScanPage, CacheError> {
            self.record("scan").map(|_| ScanPage {
                keys: Vec::new(),
                cursor: 0,
            })
        }
    }

    #[tokio::test]
    async fn every_operation_survives_a_dead_cache() {
        let store = Arc::new(UnavailableStore::new());
        let (repo, _clock) = cached_repo(store);

        let mut snippet = snippet("resilient", START);
        repo.insert(&snippet).await.expect("insert still durable");

        let fetched = repo.find_by_id(snippet.id).await.expect("read from store");
        assert_eq!(fetched.source, FetchSource::Store);
        assert_eq!(fetched.snippet.content, "resilient");

        let listed = repo.list(&query(1, 10, None)).await.expect("list from store");
        assert_eq!(listed.len(), 1);

        snippet.content = "still resilient".to_string();
        repo.update(&snippet).await.expect("update still durable");
        let fetched = repo.find_by_id(snippet.id).await.expect("fresh read");
        assert_eq!(fetched.snippet.content, "still resilient");
    }
}
