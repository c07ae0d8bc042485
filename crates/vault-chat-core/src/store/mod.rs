//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the engine's only window onto the user's
//! documents. It is injected wherever documents are needed, so the engine
//! never touches a global workspace. Modification signals are delivered by
//! the host (see the app crate's watcher), not by this trait.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentMeta;

/// Source of documents for indexing and context assembly.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_documents`](DocumentStore::list_documents) | Enumerate documents with staleness keys |
/// | [`metadata`](DocumentStore::metadata) | Title and staleness key of one document |
/// | [`read`](DocumentStore::read) | Fetch one document's raw content |
/// | [`resolve_link`](DocumentStore::resolve_link) | Map wiki-link text to a document id |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents, in a deterministic order.
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>>;

    async fn metadata(&self, id: &str) -> Result<DocumentMeta>;

    /// Raw content of a document.
    async fn read(&self, id: &str) -> Result<String>;

    /// Resolve link text (`[[note]]`, `path/to/note.md`, ...) to a document id.
    async fn resolve_link(&self, text: &str) -> Result<Option<String>>;
}

/// Strip wiki-link decoration: `[[path#heading|alias]]` → `path`.
pub fn link_target(text: &str) -> &str {
    let inner = text
        .trim()
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
        .unwrap_or_else(|| text.trim());
    let inner = inner.split('|').next().unwrap_or(inner);
    let inner = inner.split('#').next().unwrap_or(inner);
    inner.trim()
}

/// Resolve a link against a set of ids using the vault's rules.
///
/// Tries, in order: the exact id, the id with `.md` appended, then a unique
/// match on the file name with or without extension.
pub fn resolve_in<'a, I>(ids: I, text: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let target = link_target(text);
    if target.is_empty() {
        return None;
    }
    let with_ext = format!("{}.md", target);
    let ids: Vec<&str> = ids.into_iter().collect();

    if let Some(id) = ids.iter().find(|id| **id == target || **id == with_ext) {
        return Some(id.to_string());
    }

    let mut by_name = ids.iter().filter(|id| {
        let name = id.rsplit('/').next().unwrap_or_default();
        name == target || name == with_ext
    });
    match (by_name.next(), by_name.next()) {
        (Some(id), None) => Some(id.to_string()),
        _ => None,
    }
}
