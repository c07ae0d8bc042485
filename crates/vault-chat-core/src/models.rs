//! Core data models shared across the retrieval and chat pipeline.

use serde::{Deserialize, Serialize};

/// A document as listed by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Stable identity (vault-relative path).
    pub id: String,
    pub title: String,
    /// Staleness key: Unix seconds of the last modification.
    pub modified: i64,
}

/// Persisted derived data for one document.
///
/// Serialized with camelCase keys; the cache file is a JSON object mapping
/// document id to one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub title: String,
    pub content: String,
    pub terms: Vec<String>,
    pub title_terms: Vec<String>,
    /// Score from the most recent TF-IDF whole-document ranking; 0 when that
    /// pass did not return this document.
    #[serde(default)]
    pub tf_idf_score: f64,
    /// Score from the most recent BM25 whole-document ranking; 0 when that
    /// pass did not return this document.
    #[serde(default)]
    pub bm25_score: f64,
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub content_hash: String,
}

/// A heading-delimited section of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: usize,
    /// Heading text without the `#` marker; empty for leading content.
    pub title: String,
    /// First line of the chunk (0-based).
    pub start_line: usize,
    /// One past the last line of the chunk.
    pub end_line: usize,
    pub text: String,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    pub text: String,
}

/// One conversation turn: a role and its ordered text segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![MessagePart { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    /// All parts concatenated.
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}
