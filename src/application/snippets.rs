//! Snippet service: expiry evaluation, cache-status reporting, pagination
//! normalization.

use std::sync::Arc;

use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::application::clock::Clock;
use crate::application::pagination::{ListQuery, PageLimits};
use crate::application::repos::{Fetched, RepoError, SnippetRepo};
use crate::domain::snippets::Snippet;

#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("snippet not found")]
    NotFound,
    #[error("snippet has expired")]
    Expired,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for SnippetError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            other => Self::Repo(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateSnippet {
    pub content: String,
    pub expires_in_secs: u64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateSnippet {
    pub id: Uuid,
    pub content: String,
    pub tags: Vec<String>,
    /// `Some(0)` clears the expiry; `None` leaves it untouched.
    pub expires_in_secs: Option<u64>,
}

pub struct SnippetService {
    repo: Arc<dyn SnippetRepo>,
    clock: Arc<dyn Clock>,
    limits: PageLimits,
}

impl SnippetService {
    pub fn new(repo: Arc<dyn SnippetRepo>, clock: Arc<dyn Clock>, limits: PageLimits) -> Self {
        Self {
            repo,
            clock,
            limits,
        }
    }

    /// Create a snippet. `expires_in_secs == 0` means the snippet never
    /// expires.
    pub async fn create(&self, cmd: CreateSnippet) -> Result<Snippet, SnippetError> {
        let now = self.clock.now();
        let snippet = Snippet {
            id: Uuid::new_v4(),
            content: cmd.content,
            tags: cmd.tags,
            created_at: now,
            expires_at: expires_at_from(now, cmd.expires_in_secs),
        };
        self.repo.insert(&snippet).await?;
        Ok(snippet)
    }

    /// Fetch a snippet along with where it was served from.
    ///
    /// An expired snippet is suppressed here even though its row still exists
    /// in the database.
    pub async fn get(&self, id: Uuid) -> Result<Fetched, SnippetError> {
        let fetched = self.repo.find_by_id(id).await?;
        if fetched.snippet.is_expired(self.clock.now()) {
            return Err(SnippetError::Expired);
        }
        Ok(fetched)
    }

    /// Rewrite content, tags, and optionally expiry. Identifier and creation
    /// time are preserved from the stored row.
    pub async fn update(&self, cmd: UpdateSnippet) -> Result<Snippet, SnippetError> {
        let existing = self.repo.find_by_id(cmd.id).await?.snippet;
        let expires_at = match cmd.expires_in_secs {
            Some(secs) => expires_at_from(self.clock.now(), secs),
            None => existing.expires_at,
        };
        let snippet = Snippet {
            id: existing.id,
            content: cmd.content,
            tags: cmd.tags,
            created_at: existing.created_at,
            expires_at,
        };
        self.repo.update(&snippet).await?;
        Ok(snippet)
    }

    /// List one page of snippets, newest first, after normalizing the raw
    /// page/limit/tag inputs.
    pub async fn list(
        &self,
        page: i64,
        limit: i64,
        tag: Option<String>,
    ) -> Result<Vec<Snippet>, SnippetError> {
        let query = ListQuery::normalized(page, limit, tag, &self.limits);
        Ok(self.repo.list(&query).await?)
    }
}

fn expires_at_from(now: OffsetDateTime, expires_in_secs: u64) -> Option<OffsetDateTime> {
    if expires_in_secs == 0 {
        return None;
    }
    // A deadline past the representable date range (year 9999) collapses to
    // the never-expires sentinel instead of overflowing.
    let seconds = i64::try_from(expires_in_secs).unwrap_or(i64::MAX);
    now.checked_add(Duration::seconds(seconds))
}
