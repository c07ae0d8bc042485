//! Engine error taxonomy.
//!
//! Fallible functions return [`anyhow::Result`]; the variants here are
//! attached as the root cause so callers can classify a failure with
//! `err.downcast_ref::<EngineError>()`. Tokenization failures and empty
//! corpora are recovered locally and never surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Listing or reading a document failed. The document is skipped.
    #[error("document store error for '{id}': {message}")]
    DocumentStore { id: String, message: String },

    /// Loading or persisting the cache file failed.
    #[error("cache I/O error at {path}: {message}")]
    CacheIo { path: String, message: String },

    /// The LLM service failed (network, auth, malformed response).
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("unknown LLM platform: '{0}'")]
    UnknownPlatform(String),

    #[error("model '{model}' is not available on platform '{platform}'")]
    UnknownModel { platform: String, model: String },
}

impl EngineError {
    pub fn generation(message: impl Into<String>) -> Self {
        EngineError::Generation(message.into())
    }
}
