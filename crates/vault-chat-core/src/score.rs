//! BM25 and TF-IDF scoring.
//!
//! ```text
//! idf(t)  = ln(1 + (N − df[t] + 0.5) / (df[t] + 0.5))
//! tfidf   = Σ_{t∈Q, t∈D} tf(t,D) · idf(t)
//! bm25    = Σ_{t∈Q} idf(t) · tf(t,D)(k1+1) / (tf(t,D) + k1(1 − b + b|D|/L̄))
//!         +  titleWeight · idf(t) · tf(t,T)(k1+1) / (tf(t,T) + k1(1 − b + b|D|/L̄))
//! ```
//!
//! The title component reuses the body length ratio `|D|/L̄`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which scoring function the ranker applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchAlgorithm {
    #[default]
    #[serde(rename = "BM25")]
    Bm25,
    #[serde(rename = "TF-IDF")]
    TfIdf,
}

impl SearchAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchAlgorithm::Bm25 => "BM25",
            SearchAlgorithm::TfIdf => "TF-IDF",
        }
    }
}

impl std::str::FromStr for SearchAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BM25" => Ok(SearchAlgorithm::Bm25),
            "TF-IDF" | "TFIDF" => Ok(SearchAlgorithm::TfIdf),
            _ => anyhow::bail!("Unknown search algorithm: {}. Use BM25 or TF-IDF.", s),
        }
    }
}

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub title_weight: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            title_weight: 1.5,
        }
    }
}

/// Corpus-level inputs shared by every score in one ranking pass.
#[derive(Debug, Clone, Copy)]
pub struct CorpusView<'a> {
    pub df: &'a HashMap<String, usize>,
    pub total_docs: usize,
    pub avg_doc_length: f64,
}

impl CorpusView<'_> {
    fn idf_of(&self, term: &str) -> f64 {
        idf(self.df.get(term).copied().unwrap_or(0), self.total_docs)
    }
}

/// Inverse document frequency. Finite and positive for every `df <= N`,
/// including `df = 0`.
pub fn idf(df: usize, total_docs: usize) -> f64 {
    let df = df as f64;
    let n = total_docs as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Term → occurrence count.
pub fn term_frequency(terms: &[String]) -> HashMap<&str, usize> {
    let mut tf = HashMap::new();
    for t in terms {
        *tf.entry(t.as_str()).or_insert(0) += 1;
    }
    tf
}

pub fn tf_idf_score(query: &[String], doc: &[String], corpus: &CorpusView<'_>) -> f64 {
    let tf = term_frequency(doc);
    query
        .iter()
        .filter_map(|t| tf.get(t.as_str()).map(|&f| f as f64 * corpus.idf_of(t)))
        .sum()
}

pub fn bm25_score(
    query: &[String],
    doc: &[String],
    title: &[String],
    corpus: &CorpusView<'_>,
    params: &Bm25Params,
) -> f64 {
    let tf = term_frequency(doc);
    let title_tf = term_frequency(title);
    // An empty statistics snapshot has no meaningful average; treat every
    // document as average length.
    let length_ratio = if corpus.avg_doc_length > 0.0 {
        doc.len() as f64 / corpus.avg_doc_length
    } else {
        1.0
    };
    let norm = params.k1 * (1.0 - params.b + params.b * length_ratio);
    let saturate = |f: usize| {
        let f = f as f64;
        f * (params.k1 + 1.0) / (f + norm)
    };

    let mut score = 0.0;
    for term in query {
        let body = tf.get(term.as_str()).copied().unwrap_or(0);
        let in_title = title_tf.get(term.as_str()).copied().unwrap_or(0);
        if body == 0 && in_title == 0 {
            continue;
        }
        let idf = corpus.idf_of(term);
        if body > 0 {
            score += idf * saturate(body);
        }
        if in_title > 0 {
            score += params.title_weight * idf * saturate(in_title);
        }
    }
    score
}

/// Score `doc` with the selected algorithm.
pub fn score(
    algorithm: SearchAlgorithm,
    query: &[String],
    doc: &[String],
    title: &[String],
    corpus: &CorpusView<'_>,
    params: &Bm25Params,
) -> f64 {
    match algorithm {
        SearchAlgorithm::Bm25 => bm25_score(query, doc, title, corpus, params),
        SearchAlgorithm::TfIdf => tf_idf_score(query, doc, corpus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn df_of(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(t, n)| (t.to_string(), *n)).collect()
    }

    #[test]
    fn test_idf_zero_df_finite_positive() {
        for n in [0usize, 1, 10, 10_000] {
            let v = idf(0, n);
            assert!(v.is_finite() && v > 0.0, "idf(0, {}) = {}", n, v);
        }
    }

    #[test]
    fn test_idf_positive_when_term_everywhere() {
        let v = idf(5, 5);
        assert!(v > 0.0);
        assert!(idf(1, 5) > idf(5, 5));
    }

    #[test]
    fn test_tf_idf_matches_formula() {
        let df = df_of(&[("apple", 2)]);
        let corpus = CorpusView {
            df: &df,
            total_docs: 3,
            avg_doc_length: 2.0,
        };
        let s = tf_idf_score(&terms("apple"), &terms("apple apple cherry"), &corpus);
        assert!((s - 2.0 * idf(2, 3)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_when_no_overlap() {
        let df = df_of(&[]);
        let corpus = CorpusView {
            df: &df,
            total_docs: 2,
            avg_doc_length: 2.0,
        };
        let p = Bm25Params::default();
        assert_eq!(bm25_score(&terms("kiwi"), &terms("apple banana"), &[], &corpus, &p), 0.0);
        assert_eq!(tf_idf_score(&terms("kiwi"), &terms("apple banana"), &corpus), 0.0);
    }

    #[test]
    fn test_bm25_non_decreasing_in_tf() {
        let df = df_of(&[("x", 3)]);
        let corpus = CorpusView {
            df: &df,
            total_docs: 10,
            avg_doc_length: 8.0,
        };
        let p = Bm25Params::default();
        let mut prev = 0.0;
        for tf in 0..8 {
            let mut doc = vec!["x".to_string(); tf];
            doc.resize(8, "filler".to_string());
            let s = bm25_score(&terms("x"), &doc, &[], &corpus, &p);
            assert!(s >= prev, "tf={} score={} prev={}", tf, s, prev);
            prev = s;
        }
    }

    #[test]
    fn test_title_match_weighted() {
        let df = df_of(&[("rust", 1)]);
        let corpus = CorpusView {
            df: &df,
            total_docs: 4,
            avg_doc_length: 3.0,
        };
        let p = Bm25Params::default();
        let body_only = bm25_score(&terms("rust"), &terms("rust is fast"), &[], &corpus, &p);
        let with_title = bm25_score(
            &terms("rust"),
            &terms("rust is fast"),
            &terms("rust"),
            &corpus,
            &p,
        );
        assert!((with_title - body_only * (1.0 + p.title_weight)).abs() < 1e-9);
    }

    #[test]
    fn test_title_only_match_scores() {
        let df = df_of(&[]);
        let corpus = CorpusView {
            df: &df,
            total_docs: 2,
            avg_doc_length: 2.0,
        };
        let s = bm25_score(
            &terms("notes"),
            &terms("nothing here"),
            &terms("notes"),
            &corpus,
            &Bm25Params::default(),
        );
        assert!(s > 0.0);
    }

    #[test]
    fn test_empty_stats_stay_finite() {
        let df = HashMap::new();
        let corpus = CorpusView {
            df: &df,
            total_docs: 0,
            avg_doc_length: 0.0,
        };
        let s = bm25_score(&terms("a"), &terms("a b"), &[], &corpus, &Bm25Params::default());
        assert!(s.is_finite() && s > 0.0);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("BM25".parse::<SearchAlgorithm>().unwrap(), SearchAlgorithm::Bm25);
        assert_eq!("tf-idf".parse::<SearchAlgorithm>().unwrap(), SearchAlgorithm::TfIdf);
        assert!("cosine".parse::<SearchAlgorithm>().is_err());
    }
}
