//! Retrieval pipeline wiring: document store → cache → ranker → context.
//!
//! [`Engine`] bundles the injected [`DocumentStore`], the persisted
//! [`CacheStore`] and the retrieval settings. Every command that needs
//! ranked documents or an assembled context goes through it.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use vault_chat_core::context::{build_context, ContextInputs, OpenDocument};
use vault_chat_core::search::{rank, RankedDocument, SearchParams};
use vault_chat_core::store::DocumentStore;
use vault_chat_core::tokenize::Tokenizer;

use crate::cache::CacheStore;
use crate::config::{Config, RetrievalConfig};
use crate::tokenizer::create_tokenizer;
use crate::vault::VaultStore;

/// Optional editor state that frames a query.
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    /// Id of the document the user has open.
    pub current: Option<String>,
    /// Editor buffer of the open document. Read from the store when absent,
    /// so an unsaved or unlisted buffer still frames the query.
    pub current_content: Option<String>,
    pub selection: Option<String>,
}

pub struct Engine {
    store: Arc<dyn DocumentStore>,
    cache: Arc<CacheStore>,
    retrieval: RetrievalConfig,
}

impl Engine {
    /// Open the configured vault and load (or build) its cache.
    pub async fn open(config: &Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = Arc::new(VaultStore::new(&config.vault)?);
        let tokenizer = create_tokenizer(&config.tokenizer)?;
        Self::with_store(store, &config.cache.path, tokenizer, config.retrieval.clone()).await
    }

    pub async fn with_store(
        store: Arc<dyn DocumentStore>,
        cache_path: &Path,
        tokenizer: Arc<dyn Tokenizer>,
        retrieval: RetrievalConfig,
    ) -> Result<Self> {
        let cache = CacheStore::load_or_initialize(cache_path, store.as_ref(), tokenizer)
            .await
            .with_context(|| format!("Failed to load cache: {}", cache_path.display()))?;
        Ok(Self {
            store,
            cache: Arc::new(cache),
            retrieval,
        })
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Rank with the configured parameters.
    pub async fn search(&self, query: &str) -> Result<Vec<RankedDocument>> {
        let params = self.retrieval.search_params()?;
        Ok(self.search_with(query, &params).await)
    }

    /// Rank with explicit parameters.
    ///
    /// Whole-document passes record their scores in the cache.
    pub async fn search_with(&self, query: &str, params: &SearchParams) -> Vec<RankedDocument> {
        let results = {
            let index = self.cache.index().await;
            rank(&index, self.cache.tokenizer(), query, params)
        };
        debug!(
            query,
            algorithm = params.algorithm.as_str(),
            chunked = params.chunk_enabled,
            hits = results.len(),
            "ranked documents"
        );
        if !params.chunk_enabled {
            self.cache.record_scores(params.algorithm, &results).await;
        }
        results
    }

    /// Rank `query` and assemble the bounded context string.
    pub async fn context(&self, query: &str, request: &ContextRequest) -> Result<String> {
        let results = self.search(query).await?;
        let current = match (request.current.as_deref(), &request.current_content) {
            (Some(id), Some(buffer)) => Some((id, buffer.clone())),
            (Some(id), None) => {
                let content = self
                    .store
                    .read(id)
                    .await
                    .with_context(|| format!("Failed to read current document: {}", id))?;
                Some((id, content))
            }
            (None, _) => None,
        };

        let inputs = ContextInputs {
            current: current.as_ref().map(|(path, content)| OpenDocument {
                path: *path,
                content: content.as_str(),
            }),
            selection: request.selection.as_deref(),
            results: &results,
        };
        Ok(build_context(&inputs, self.retrieval.max_context_length))
    }
}
