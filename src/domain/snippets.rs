//! The snippet entity and its expiry rules.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored snippet.
///
/// `id` and `created_at` are fixed at creation; updates may only change
/// content, tags, and `expires_at`. A `None` expiry means the snippet never
/// expires. Expiry is logical: an expired snippet stays in the database and
/// is suppressed at read time, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: Uuid,
    pub content: String,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl Snippet {
    /// Whether the snippet is past its logical expiry at `now`.
    ///
    /// A snippet is expired only strictly after `expires_at`; reading at the
    /// exact expiry instant still succeeds.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }

    /// Whether the snippet should still appear in listings at `now`.
    ///
    /// Listings are stricter than single reads: an entry whose expiry is not
    /// strictly in the future is dropped.
    pub fn is_listable(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}
