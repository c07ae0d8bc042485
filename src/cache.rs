//! Persisted corpus cache.
//!
//! [`CacheStore`] owns the [`CorpusIndex`] and mirrors it to a single JSON
//! file: an object keyed by document id whose values are camelCase
//! [`CacheEntry`] records. Every mutation runs under one async mutex held
//! across read → tokenize → persist, so per-document recomputes never
//! interleave.
//!
//! # Failure handling
//!
//! | Situation | Behaviour |
//! |-----------|-----------|
//! | Cache file missing | start empty, no warning |
//! | Cache file unreadable or corrupt | `warn!`, start empty |
//! | Persist fails | `warn!`, keep serving from memory |
//! | Document unreadable | `warn!`, skip the document |
//!
//! # Statistics
//!
//! Membership changes (new or removed documents) recompute document
//! frequency and average length. Content changes to an existing document do
//! not; call [`CacheStore::recompute_statistics`] for strict consistency.
//!
//! # Staleness
//!
//! Every entry carries the staleness key it was built from. Loading compares
//! it against the store's listing and recomputes the entries whose key moved,
//! so edits made while nothing was watching are picked up by the next
//! command.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use vault_chat_core::index::{build_entry, content_hash, CorpusIndex};
use vault_chat_core::models::{CacheEntry, DocumentMeta};
use vault_chat_core::score::SearchAlgorithm;
use vault_chat_core::search::RankedDocument;
use vault_chat_core::store::DocumentStore;
use vault_chat_core::tokenize::Tokenizer;
use vault_chat_core::EngineError;

/// What a [`CacheStore::refresh`] pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: usize,
    /// Cached documents the store no longer lists. Kept in the cache.
    pub missing: Vec<String>,
    pub skipped: Vec<String>,
}

impl RefreshReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

pub struct CacheStore {
    path: PathBuf,
    tokenizer: Arc<dyn Tokenizer>,
    index: Mutex<CorpusIndex>,
    added_on_load: usize,
    updated_on_load: usize,
}

impl CacheStore {
    /// Load the cache file and bring it in line with the store.
    ///
    /// Documents the file does not know are added; documents whose staleness
    /// key changed since they were cached are recomputed. Statistics are
    /// derived from the cached entries and re-derived only when documents
    /// were added.
    pub async fn load_or_initialize(
        path: &Path,
        store: &dyn DocumentStore,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        let entries = match read_cache_file(path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "ignoring unusable cache file; starting empty");
                BTreeMap::new()
            }
        };
        let cached = entries.len();
        let mut index = CorpusIndex::from_entries(entries);

        let mut added = 0usize;
        let mut updated = 0usize;
        let mut touched = false;
        for meta in store.list_documents().await? {
            match index.get(&meta.id).map(|e| e.modified) {
                None => {
                    if let Some(entry) = load_entry(store, tokenizer.as_ref(), &meta).await {
                        index.insert_document(&meta.id, entry);
                        added += 1;
                    }
                }
                Some(modified) if modified != meta.modified => {
                    match apply_modification(&mut index, store, tokenizer.as_ref(), &meta).await {
                        Modification::Rewritten => updated += 1,
                        Modification::Touched => touched = true,
                        Modification::Skipped => {}
                    }
                }
                Some(_) => {}
            }
        }
        if added > 0 {
            index.recompute_statistics();
        }

        info!(
            cached,
            added,
            updated,
            total = index.len(),
            avg_doc_length = index.average_document_length(),
            "cache initialized"
        );

        let cache = Self {
            path: path.to_path_buf(),
            tokenizer,
            index: Mutex::new(index),
            added_on_load: added,
            updated_on_load: updated,
        };
        if added > 0 || updated > 0 || touched {
            let index = cache.index.lock().await;
            cache.persist(&index).await;
        }
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Documents that were absent from the cache file when it was loaded.
    pub fn added_on_load(&self) -> usize {
        self.added_on_load
    }

    /// Cached documents recomputed on load because their staleness key moved.
    pub fn updated_on_load(&self) -> usize {
        self.updated_on_load
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Exclusive access to the index, e.g. for ranking.
    pub async fn index(&self) -> MutexGuard<'_, CorpusIndex> {
        self.index.lock().await
    }

    /// Recompute one document's term data and persist the snapshot.
    ///
    /// Returns `true` when the entry was rewritten. A document whose bytes
    /// did not change only has its staleness key bumped. An unreadable
    /// document is logged and left as it was.
    pub async fn on_document_modified(&self, store: &dyn DocumentStore, id: &str) -> Result<bool> {
        let mut index = self.index.lock().await;
        let meta = match store.metadata(id).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(id, error = %e, "skipping modified document");
                return Ok(false);
            }
        };
        let outcome =
            apply_modification(&mut index, store, self.tokenizer.as_ref(), &meta).await;
        if outcome != Modification::Skipped {
            self.persist(&index).await;
        }
        Ok(outcome == Modification::Rewritten)
    }

    /// Bring the cache in line with the store's current listing.
    ///
    /// New documents are added (and trigger a statistics recompute), changed
    /// documents are recomputed individually, missing documents are reported
    /// but kept.
    pub async fn refresh(&self, store: &dyn DocumentStore) -> Result<RefreshReport> {
        let listing = store.list_documents().await?;
        let mut index = self.index.lock().await;
        let mut report = RefreshReport::default();
        let mut touched = false;

        let listed: HashSet<&str> = listing.iter().map(|m| m.id.as_str()).collect();
        report.missing = index
            .entries()
            .keys()
            .filter(|id| !listed.contains(id.as_str()))
            .cloned()
            .collect();

        for meta in &listing {
            match index.get(&meta.id).map(|e| e.modified) {
                None => match load_entry(store, self.tokenizer.as_ref(), meta).await {
                    Some(entry) => {
                        index.insert_document(&meta.id, entry);
                        report.added.push(meta.id.clone());
                    }
                    None => report.skipped.push(meta.id.clone()),
                },
                Some(modified) if modified != meta.modified => {
                    match apply_modification(&mut index, store, self.tokenizer.as_ref(), meta).await {
                        Modification::Rewritten => report.updated.push(meta.id.clone()),
                        Modification::Touched => {
                            touched = true;
                            report.unchanged += 1;
                        }
                        Modification::Skipped => report.skipped.push(meta.id.clone()),
                    }
                }
                Some(_) => report.unchanged += 1,
            }
        }

        if !report.added.is_empty() {
            index.recompute_statistics();
        }
        if !report.missing.is_empty() {
            warn!(
                count = report.missing.len(),
                "cached documents no longer in the vault (run `index --prune` to drop them)"
            );
        }
        if !report.is_noop() || touched {
            self.persist(&index).await;
        }

        info!(
            added = report.added.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged,
            missing = report.missing.len(),
            "cache refreshed"
        );
        Ok(report)
    }

    /// Drop a document from the cache, recompute statistics and persist.
    pub async fn remove_document(&self, id: &str) -> bool {
        let mut index = self.index.lock().await;
        let removed = index.remove_document(id).is_some();
        if removed {
            debug!(id, "removed document from cache");
            self.persist(&index).await;
        }
        removed
    }

    /// Replace the score snapshot with a whole-document ranking pass.
    ///
    /// Documents the pass did not return are reset to 0. The file is only
    /// rewritten when a stored score changed.
    pub async fn record_scores(&self, algorithm: SearchAlgorithm, results: &[RankedDocument]) {
        let scores: HashMap<&str, f64> = results.iter().map(|d| (d.id.as_str(), d.score)).collect();
        let mut index = self.index.lock().await;
        if index.record_scores(algorithm, &scores) {
            self.persist(&index).await;
        }
    }

    pub async fn recompute_statistics(&self) {
        self.index.lock().await.recompute_statistics();
    }

    /// Write the snapshot through a temporary sibling file, then rename.
    async fn persist(&self, index: &CorpusIndex) {
        if let Err(e) = write_cache_file(&self.path, index.entries()).await {
            warn!(error = %e, "failed to persist cache; continuing in memory");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modification {
    Rewritten,
    Touched,
    Skipped,
}

async fn apply_modification(
    index: &mut CorpusIndex,
    store: &dyn DocumentStore,
    tokenizer: &dyn Tokenizer,
    meta: &DocumentMeta,
) -> Modification {
    let content = match store.read(&meta.id).await {
        Ok(content) => content,
        Err(e) => {
            warn!(id = %meta.id, error = %e, "skipping unreadable document");
            return Modification::Skipped;
        }
    };

    if let Some(entry) = index.entry_mut(&meta.id) {
        if entry.title == meta.title && entry.content_hash == content_hash(&content) {
            entry.modified = meta.modified;
            return Modification::Touched;
        }
    }

    let entry = build_entry(tokenizer, &meta.title, &content, meta.modified);
    let is_new = !index.contains(&meta.id);
    index.update_document(&meta.id, entry);
    if is_new {
        index.recompute_statistics();
    }
    debug!(id = %meta.id, "recomputed document");
    Modification::Rewritten
}

async fn load_entry(
    store: &dyn DocumentStore,
    tokenizer: &dyn Tokenizer,
    meta: &DocumentMeta,
) -> Option<CacheEntry> {
    match store.read(&meta.id).await {
        Ok(content) => Some(build_entry(tokenizer, &meta.title, &content, meta.modified)),
        Err(e) => {
            warn!(id = %meta.id, error = %e, "skipping unreadable document");
            None
        }
    }
}

fn cache_io(path: &Path, message: impl ToString) -> anyhow::Error {
    EngineError::CacheIo {
        path: path.display().to_string(),
        message: message.to_string(),
    }
    .into()
}

async fn read_cache_file(path: &Path) -> Result<BTreeMap<String, CacheEntry>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(cache_io(path, e)),
    };
    serde_json::from_str(&raw).map_err(|e| cache_io(path, e))
}

async fn write_cache_file(path: &Path, entries: &BTreeMap<String, CacheEntry>) -> Result<()> {
    let json = serde_json::to_string(entries).map_err(|e| cache_io(path, e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| cache_io(path, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| cache_io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| cache_io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_chat_core::store::memory::InMemoryDocumentStore;
    use vault_chat_core::tokenize::UnicodeTokenizer;

    fn tokenizer() -> Arc<dyn Tokenizer> {
        Arc::new(UnicodeTokenizer)
    }

    fn store() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store.put("a.md", "a", "apple banana");
        store.put("b.md", "b", "banana cherry date");
        store
    }

    #[tokio::test]
    async fn test_initialize_writes_camel_case_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache/vault.json");
        let cache = CacheStore::load_or_initialize(&path, &store(), tokenizer())
            .await
            .unwrap();
        assert_eq!(cache.index().await.total_documents(), 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &json["b.md"];
        assert_eq!(entry["titleTerms"], serde_json::json!(["b"]));
        assert_eq!(entry["terms"], serde_json::json!(["banana", "cherry", "date"]));
        assert!(entry.get("bm25Score").is_some());
        assert!(entry.get("tfIdfScore").is_some());
    }

    #[tokio::test]
    async fn test_reload_picks_up_edit_between_opens() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        let first = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        let df_before = first.index().await.document_frequency().clone();
        drop(first);

        docs.put("a.md", "a", "kiwi kiwi");
        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        assert_eq!(cache.added_on_load(), 0);
        assert_eq!(cache.updated_on_load(), 1);
        {
            let index = cache.index().await;
            let entry = index.get("a.md").unwrap();
            assert_eq!(entry.terms, vec!["kiwi", "kiwi"]);
            assert_eq!(entry.content, "kiwi kiwi");
            assert_eq!(entry.modified, 2);
            // A content change alone does not re-derive corpus statistics.
            assert_eq!(index.document_frequency(), &df_before);
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["a.md"]["terms"], serde_json::json!(["kiwi", "kiwi"]));
    }

    #[tokio::test]
    async fn test_reload_without_changes_reuses_entries() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();

        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        assert_eq!(cache.added_on_load(), 0);
        assert_eq!(cache.updated_on_load(), 0);
        assert_eq!(cache.index().await.get("a.md").unwrap().terms, vec!["apple", "banana"]);
    }

    #[tokio::test]
    async fn test_corrupt_cache_starts_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = CacheStore::load_or_initialize(&path, &store(), tokenizer())
            .await
            .unwrap();
        assert_eq!(cache.index().await.len(), 2);
        // The corrupt file was replaced by a valid snapshot.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_modification_keeps_statistics() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        let df_before = cache.index().await.document_frequency().clone();

        docs.put("a.md", "a", "kiwi kiwi kiwi");
        assert!(cache.on_document_modified(&docs, "a.md").await.unwrap());
        {
            let index = cache.index().await;
            assert_eq!(index.get("a.md").unwrap().terms, vec!["kiwi", "kiwi", "kiwi"]);
            assert_eq!(index.document_frequency(), &df_before);
        }

        cache.recompute_statistics().await;
        let index = cache.index().await;
        assert_eq!(index.document_frequency().get("kiwi"), Some(&1));
        assert_eq!(index.document_frequency().get("apple"), None);
    }

    #[tokio::test]
    async fn test_modification_is_write_through() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        docs.put("b.md", "b", "elderberry");
        cache.on_document_modified(&docs, "b.md").await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["b.md"]["terms"], serde_json::json!(["elderberry"]));
    }

    #[tokio::test]
    async fn test_unchanged_bytes_only_touch() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        docs.put("a.md", "a", "apple banana");
        assert!(!cache.on_document_modified(&docs, "a.md").await.unwrap());
        assert_eq!(cache.index().await.get("a.md").unwrap().modified, 2);
    }

    #[tokio::test]
    async fn test_unreadable_document_is_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();
        assert!(!cache.on_document_modified(&docs, "ghost.md").await.unwrap());
        assert_eq!(cache.index().await.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_reports_changes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let docs = store();
        let cache = CacheStore::load_or_initialize(&path, &docs, tokenizer())
            .await
            .unwrap();

        docs.put("c.md", "c", "fig grape");
        docs.put("a.md", "a", "apple apple");
        docs.remove("b.md");

        let report = cache.refresh(&docs).await.unwrap();
        assert_eq!(report.added, vec!["c.md"]);
        assert_eq!(report.updated, vec!["a.md"]);
        assert_eq!(report.missing, vec!["b.md"]);

        let index = cache.index().await;
        // Missing documents stay until pruned; new ones count immediately.
        assert_eq!(index.len(), 3);
        assert_eq!(index.total_documents(), 3);
        assert_eq!(index.document_frequency().get("fig"), Some(&1));
    }

    #[tokio::test]
    async fn test_remove_document_recomputes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let cache = CacheStore::load_or_initialize(&path, &store(), tokenizer())
            .await
            .unwrap();
        assert!(cache.remove_document("b.md").await);
        assert!(!cache.remove_document("b.md").await);
        let index = cache.index().await;
        assert_eq!(index.total_documents(), 1);
        assert_eq!(index.document_frequency().get("cherry"), None);
    }

    #[tokio::test]
    async fn test_record_scores() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("vault.json");
        let cache = CacheStore::load_or_initialize(&path, &store(), tokenizer())
            .await
            .unwrap();
        let hit = |id: &str, score: f64| RankedDocument {
            id: id.to_string(),
            title: id.to_string(),
            score,
            content: String::new(),
            chunks: Vec::new(),
        };

        cache.record_scores(SearchAlgorithm::Bm25, &[hit("a.md", 1.25)]).await;
        {
            let index = cache.index().await;
            assert_eq!(index.get("a.md").unwrap().bm25_score, 1.25);
            assert_eq!(index.get("a.md").unwrap().tf_idf_score, 0.0);
        }

        // A later pass that misses a.md clears its stale score.
        cache.record_scores(SearchAlgorithm::Bm25, &[hit("b.md", 0.5)]).await;
        let index = cache.index().await;
        assert_eq!(index.get("a.md").unwrap().bm25_score, 0.0);
        assert_eq!(index.get("b.md").unwrap().bm25_score, 0.5);

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["a.md"]["bm25Score"].as_f64().unwrap(), 0.0);
        assert_eq!(json["b.md"]["bm25Score"].as_f64().unwrap(), 0.5);
    }
}
