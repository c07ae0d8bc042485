//! Corpus statistics index.
//!
//! [`CorpusIndex`] owns one [`CacheEntry`] per document plus the corpus-wide
//! statistics derived from them:
//!
//! - `df[t] = |{d : t ∈ terms(d)}|`
//! - `avg_doc_length = Σ len(terms(d)) / total_docs`
//!
//! Statistics are a snapshot of the last full recompute. Replacing a single
//! document's entry with [`CorpusIndex::update_document`] does **not**
//! refresh them; membership changes ([`insert_document`](CorpusIndex::insert_document)
//! for a new id, [`remove_document`](CorpusIndex::remove_document)) are
//! followed by an explicit [`recompute_statistics`](CorpusIndex::recompute_statistics)
//! by the owner.
//!
//! Entries iterate in ascending id order; that order is the scan order the
//! ranker preserves on ties.

use std::collections::{BTreeMap, HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::models::CacheEntry;
use crate::score::{CorpusView, SearchAlgorithm};
use crate::tokenize::Tokenizer;

/// Corpus-wide statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStatistics {
    pub document_frequency: HashMap<String, usize>,
    pub total_docs: usize,
    pub avg_doc_length: f64,
}

impl CorpusStatistics {
    pub fn compute<'a>(entries: impl IntoIterator<Item = &'a CacheEntry>) -> Self {
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut total_docs = 0usize;
        let mut total_len = 0usize;

        for entry in entries {
            total_docs += 1;
            total_len += entry.terms.len();
            let unique: HashSet<&str> = entry.terms.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let avg_doc_length = if total_docs == 0 {
            0.0
        } else {
            total_len as f64 / total_docs as f64
        };

        Self {
            document_frequency,
            total_docs,
            avg_doc_length,
        }
    }

    pub fn view(&self) -> CorpusView<'_> {
        CorpusView {
            df: &self.document_frequency,
            total_docs: self.total_docs,
            avg_doc_length: self.avg_doc_length,
        }
    }
}

/// SHA-256 of document content, hex-encoded.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Tokenize a document into a fresh cache entry.
pub fn build_entry(
    tokenizer: &dyn Tokenizer,
    title: &str,
    content: &str,
    modified: i64,
) -> CacheEntry {
    CacheEntry {
        title: title.to_string(),
        content: content.to_string(),
        terms: tokenizer.tokenize(content),
        title_terms: tokenizer.tokenize(title),
        tf_idf_score: 0.0,
        bm25_score: 0.0,
        modified,
        content_hash: content_hash(content),
    }
}

/// Per-document term data and corpus statistics.
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    entries: BTreeMap<String, CacheEntry>,
    stats: CorpusStatistics,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from persisted entries and compute statistics.
    pub fn from_entries(entries: BTreeMap<String, CacheEntry>) -> Self {
        let mut index = Self {
            entries,
            stats: CorpusStatistics::default(),
        };
        index.recompute_statistics();
        index
    }

    pub fn entries(&self) -> &BTreeMap<String, CacheEntry> {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry. Returns `true` when `id` is new to the index, in
    /// which case the statistics are stale until recomputed.
    pub fn insert_document(&mut self, id: &str, entry: CacheEntry) -> bool {
        self.entries.insert(id.to_string(), entry).is_none()
    }

    /// Overwrite the term data of a document, keeping its score snapshot.
    ///
    /// Corpus statistics are left as they were.
    pub fn update_document(&mut self, id: &str, mut entry: CacheEntry) {
        if let Some(old) = self.entries.get(id) {
            entry.tf_idf_score = old.tf_idf_score;
            entry.bm25_score = old.bm25_score;
        }
        self.entries.insert(id.to_string(), entry);
    }

    /// Remove a document and recompute statistics.
    pub fn remove_document(&mut self, id: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.recompute_statistics();
        }
        removed
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(id)
    }

    /// Replace the `algorithm` score snapshot with one ranking pass: ids in
    /// `scores` take their score, every other document is reset to 0.
    ///
    /// Returns `true` when any stored score changed.
    pub fn record_scores(&mut self, algorithm: SearchAlgorithm, scores: &HashMap<&str, f64>) -> bool {
        let mut changed = false;
        for (id, entry) in self.entries.iter_mut() {
            let score = scores.get(id.as_str()).copied().unwrap_or(0.0);
            let slot = match algorithm {
                SearchAlgorithm::Bm25 => &mut entry.bm25_score,
                SearchAlgorithm::TfIdf => &mut entry.tf_idf_score,
            };
            if *slot != score {
                *slot = score;
                changed = true;
            }
        }
        changed
    }

    /// Re-derive document frequency, total and average length from the
    /// current entry set.
    pub fn recompute_statistics(&mut self) {
        self.stats = CorpusStatistics::compute(self.entries.values());
    }

    pub fn statistics(&self) -> &CorpusStatistics {
        &self.stats
    }

    pub fn document_frequency(&self) -> &HashMap<String, usize> {
        &self.stats.document_frequency
    }

    pub fn total_documents(&self) -> usize {
        self.stats.total_docs
    }

    pub fn average_document_length(&self) -> f64 {
        self.stats.avg_doc_length
    }
}
