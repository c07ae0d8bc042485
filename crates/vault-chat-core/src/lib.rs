//! # Vault Chat Core
//!
//! Runtime-agnostic logic for Vault Chat: data models, tokenization, the
//! corpus statistics index, BM25/TF-IDF scoring, heading chunker, ranker,
//! context assembly, and conversation history management.
//!
//! This crate performs no filesystem or network I/O. Document access and
//! text generation are reached through the [`store::DocumentStore`] and
//! [`llm::LlmService`] traits, implemented by the application crate.

pub mod chunk;
pub mod context;
pub mod error;
pub mod history;
pub mod index;
pub mod llm;
pub mod models;
pub mod score;
pub mod search;
pub mod session;
pub mod store;
pub mod tokenize;

pub use error::EngineError;
