//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::ListQuery;
use crate::domain::snippets::Snippet;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Where a single-item read was actually served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Cache,
    Store,
}

/// A snippet plus the source it was served from.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub snippet: Snippet,
    pub source: FetchSource,
}

impl Fetched {
    pub fn from_store(snippet: Snippet) -> Self {
        Self {
            snippet,
            source: FetchSource::Store,
        }
    }

    pub fn from_cache(snippet: Snippet) -> Self {
        Self {
            snippet,
            source: FetchSource::Cache,
        }
    }
}

/// Snippet persistence, implemented by the Postgres adapter, the cache-aside
/// decorator, and the in-memory fake. Callers pick a variant at composition
/// time.
#[async_trait]
pub trait SnippetRepo: Send + Sync {
    /// Persist a new snippet. The identifier must be fresh.
    async fn insert(&self, snippet: &Snippet) -> Result<(), RepoError>;

    /// Fetch one snippet; `RepoError::NotFound` denotes absence.
    async fn find_by_id(&self, id: Uuid) -> Result<Fetched, RepoError>;

    /// Fetch one page of snippets, newest first, optionally filtered by tag.
    async fn list(&self, query: &ListQuery) -> Result<Vec<Snippet>, RepoError>;

    /// Rewrite content, tags, and expiry of an existing snippet.
    async fn update(&self, snippet: &Snippet) -> Result<(), RepoError>;
}
