//! # Vault Chat
//!
//! Chat with a local Markdown vault. Vault Chat ranks notes against a
//! question with BM25 or TF-IDF, assembles the best matches into a bounded
//! context, and sends it to an LLM while keeping a clean conversation
//! history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │  Vault   │──▶│ CacheStore │──▶│   Ranker   │──▶│ Context  │
//! │ (.md FS) │   │ JSON index │   │ BM25/TFIDF │   │ Assembly │
//! └────┬─────┘   └────────────┘   └────────────┘   └────┬─────┘
//!      │ watch                                          ▼
//!      └───────────▶ on_document_modified      ┌──────────────┐
//!                                               │ ChatSession  │──▶ Gemini
//!                                               └──────────────┘
//! ```
//!
//! Pure logic lives in the `vault-chat-core` crate; this crate adds the
//! filesystem vault, the cache file, the Gemini client and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`vault`] | Filesystem document store |
//! | [`cache`] | Persisted corpus cache |
//! | [`tokenizer`] | Tokenizer selection |
//! | [`engine`] | Retrieval pipeline wiring |
//! | [`llm`] | LLM service factory and Gemini client |
//! | [`ask`] | Questions and interactive chat |
//! | [`writing`] | Continue-writing and flowchart assistants |
//! | [`watch`] | Modification watcher |
//! | [`index`] | Index command |
//! | [`search`] | Search, context and link commands |

pub mod ask;
pub mod cache;
pub mod config;
pub mod engine;
pub mod index;
pub mod llm;
pub mod search;
pub mod tokenizer;
pub mod vault;
pub mod watch;
pub mod writing;
