//! In-memory durable store.
//!
//! Backs tests and local experiments with the same contract as the Postgres
//! adapter: rows survive until updated, listing is newest first, and
//! pagination happens here rather than in the caller.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::pagination::ListQuery;
use crate::application::repos::{Fetched, RepoError, SnippetRepo};
use crate::domain::snippets::Snippet;

#[derive(Default)]
pub struct MemorySnippetRepo {
    rows: RwLock<HashMap<Uuid, Snippet>>,
    reads: AtomicU64,
}

impl MemorySnippetRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read operations served, for asserting that cached reads
    /// never reach this store.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    // Each row is replaced whole, so a poisoned lock is recovered rather
    // than propagated.
    fn rows(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Snippet>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn rows_mut(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Snippet>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SnippetRepo for MemorySnippetRepo {
    async fn insert(&self, snippet: &Snippet) -> Result<(), RepoError> {
        let mut rows = self.rows_mut();
        if rows.contains_key(&snippet.id) {
            return Err(RepoError::from_persistence(format!(
                "duplicate snippet id {}",
                snippet.id
            )));
        }
        rows.insert(snippet.id, snippet.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Fetched, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows();
        rows.get(&id)
            .cloned()
            .map(Fetched::from_store)
            .ok_or(RepoError::NotFound)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Snippet>, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows();
        let mut matched: Vec<Snippet> = rows
            .values()
            .filter(|snippet| match query.tag.as_deref() {
                Some(tag) => snippet.tags.iter().any(|t| t == tag),
                None => true,
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .collect())
    }

    async fn update(&self, snippet: &Snippet) -> Result<(), RepoError> {
        let mut rows = self.rows_mut();
        match rows.get_mut(&snippet.id) {
            Some(existing) => {
                *existing = snippet.clone();
                Ok(())
            }
            None => Err(RepoError::NotFound),
        }
    }
}
