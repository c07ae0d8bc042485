//! In-memory [`DocumentStore`] implementation for tests and embedding hosts.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`. Listing order is ascending
//! id, matching the filesystem store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentMeta;
use crate::EngineError;

use super::{resolve_in, DocumentStore};

struct StoredDoc {
    title: String,
    content: String,
    modified: i64,
}

/// In-memory document store.
pub struct InMemoryDocumentStore {
    docs: RwLock<BTreeMap<String, StoredDoc>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace a document, bumping its staleness key.
    pub fn put(&self, id: &str, title: &str, content: &str) {
        let mut docs = self.docs.write().unwrap();
        let modified = docs.get(id).map(|d| d.modified + 1).unwrap_or(1);
        docs.insert(
            id.to_string(),
            StoredDoc {
                title: title.to_string(),
                content: content.to_string(),
                modified,
            },
        );
    }

    pub fn remove(&self, id: &str) -> bool {
        self.docs.write().unwrap().remove(id).is_some()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(id: &str) -> EngineError {
    EngineError::DocumentStore {
        id: id.to_string(),
        message: "no such document".to_string(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .map(|(id, d)| DocumentMeta {
                id: id.clone(),
                title: d.title.clone(),
                modified: d.modified,
            })
            .collect())
    }

    async fn metadata(&self, id: &str) -> Result<DocumentMeta> {
        let docs = self.docs.read().unwrap();
        let d = docs.get(id).ok_or_else(|| missing(id))?;
        Ok(DocumentMeta {
            id: id.to_string(),
            title: d.title.clone(),
            modified: d.modified,
        })
    }

    async fn read(&self, id: &str) -> Result<String> {
        let docs = self.docs.read().unwrap();
        docs.get(id)
            .map(|d| d.content.clone())
            .ok_or_else(|| missing(id).into())
    }

    async fn resolve_link(&self, text: &str) -> Result<Option<String>> {
        let docs = self.docs.read().unwrap();
        Ok(resolve_in(docs.keys().map(String::as_str), text))
    }
}
