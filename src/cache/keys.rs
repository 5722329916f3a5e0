//! Cache key naming.
//!
//! Two namespaces share the cache: `snippet:` for single items and
//! `snippets:` for derived list pages. The prefixes are near-substrings of
//! each other, so selection of list-shaped keys must always exclude
//! item-shaped ones explicitly rather than rely on the pattern alone.

use uuid::Uuid;

use crate::application::pagination::ListQuery;

/// Prefix for single-item entries.
pub const ITEM_PREFIX: &str = "snippet:";

/// Prefix for list-page entries.
pub const LIST_PREFIX: &str = "snippets:";

/// SCAN pattern covering the list namespace.
pub const LIST_SCAN_PATTERN: &str = "snippets:*";

pub fn item_key(id: Uuid) -> String {
    format!("{ITEM_PREFIX}{id}")
}

pub fn list_key(query: &ListQuery) -> String {
    match query.tag.as_deref() {
        Some(tag) => format!("{LIST_PREFIX}{}:{}:{tag}", query.page, query.limit),
        None => format!("{LIST_PREFIX}{}:{}", query.page, query.limit),
    }
}

/// Whether a scanned key belongs to the list namespace and not the item one.
pub fn is_list_key(key: &str) -> bool {
    key.starts_with(LIST_PREFIX) && !key.starts_with(ITEM_PREFIX)
}
