//! Ranker: whole-document and chunk-aggregated retrieval over a [`CorpusIndex`].
//!
//! # Whole-document mode
//!
//! 1. Score every document with BM25 or TF-IDF.
//! 2. Sort by score (desc), stable on ties (index scan order).
//! 3. Drop scores `<= 0`.
//! 4. Truncate to `document_num`.
//!
//! # Chunk-aggregated mode
//!
//! 1. Split every document at top-level headings ([`chunk_by_headings`]).
//! 2. Score every chunk (chunk body as the document, heading as the title)
//!    against the corpus-level statistics.
//! 3. Per document, keep the top `chunk_num` chunk scores.
//! 4. Document score = arithmetic mean of those scores.
//! 5. Rank documents as in whole-document mode.

use std::cmp::Ordering;

use serde::Serialize;

use crate::chunk::chunk_by_headings;
use crate::index::CorpusIndex;
use crate::models::Chunk;
use crate::score::{self, Bm25Params, SearchAlgorithm};
use crate::tokenize::Tokenizer;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub algorithm: SearchAlgorithm,
    /// Maximum documents returned.
    pub document_num: usize,
    /// Score per chunk instead of per document.
    pub chunk_enabled: bool,
    /// Chunks averaged per document in chunk mode.
    pub chunk_num: usize,
    pub bm25: Bm25Params,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            algorithm: SearchAlgorithm::Bm25,
            document_num: 5,
            chunk_enabled: false,
            chunk_num: 3,
            bm25: Bm25Params::default(),
        }
    }
}

/// A chunk and its score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_index: usize,
    pub title: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f64,
}

/// A ranked document.
#[derive(Debug, Clone, Serialize)]
pub struct RankedDocument {
    pub id: String,
    pub title: String,
    /// Always `> 0`.
    pub score: f64,
    #[serde(skip)]
    pub content: String,
    /// Top chunks that produced `score` (chunk mode only), best first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<ScoredChunk>,
}

/// Rank the indexed corpus against `query`.
///
/// An empty corpus or a query with no tokens yields an empty result.
pub fn rank(
    index: &CorpusIndex,
    tokenizer: &dyn Tokenizer,
    query: &str,
    params: &SearchParams,
) -> Vec<RankedDocument> {
    if index.is_empty() || params.document_num == 0 {
        return Vec::new();
    }
    let query_terms = tokenizer.tokenize(query);
    if query_terms.is_empty() {
        return Vec::new();
    }

    let corpus = index.statistics().view();

    let scored: Vec<RankedDocument> = index
        .entries()
        .iter()
        .map(|(id, entry)| {
            if params.chunk_enabled {
                let chunks = chunk_by_headings(id, &entry.content);
                let mut chunk_scores: Vec<ScoredChunk> = chunks
                    .iter()
                    .map(|c| score_chunk(c, tokenizer, &query_terms, params, &corpus))
                    .collect();
                sort_desc(&mut chunk_scores, |c| c.score);
                chunk_scores.truncate(params.chunk_num.max(1));
                RankedDocument {
                    id: id.clone(),
                    title: entry.title.clone(),
                    score: mean(chunk_scores.iter().map(|c| c.score)),
                    content: entry.content.clone(),
                    chunks: chunk_scores,
                }
            } else {
                RankedDocument {
                    id: id.clone(),
                    title: entry.title.clone(),
                    score: score::score(
                        params.algorithm,
                        &query_terms,
                        &entry.terms,
                        &entry.title_terms,
                        &corpus,
                        &params.bm25,
                    ),
                    content: entry.content.clone(),
                    chunks: Vec::new(),
                }
            }
        })
        .collect();

    select_top(scored, params.document_num)
}

fn score_chunk(
    chunk: &Chunk,
    tokenizer: &dyn Tokenizer,
    query_terms: &[String],
    params: &SearchParams,
    corpus: &score::CorpusView<'_>,
) -> ScoredChunk {
    let terms = tokenizer.tokenize(&chunk.text);
    let title_terms = tokenizer.tokenize(&chunk.title);
    ScoredChunk {
        chunk_index: chunk.chunk_index,
        title: chunk.title.clone(),
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        score: score::score(
            params.algorithm,
            query_terms,
            &terms,
            &title_terms,
            corpus,
            &params.bm25,
        ),
    }
}

/// Stable descending sort, drop non-positive scores, truncate.
fn select_top(mut docs: Vec<RankedDocument>, limit: usize) -> Vec<RankedDocument> {
    sort_desc(&mut docs, |d| d.score);
    docs.retain(|d| d.score > 0.0);
    docs.truncate(limit);
    docs
}

fn sort_desc<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    // slice::sort_by is stable; NaN compares equal and keeps its position.
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
