//! TOML configuration parsing and validation.
//!
//! See `config/vchat.example.toml` for a complete example. Only `[vault]`
//! is required; every other section falls back to its defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use vault_chat_core::llm::LlmPlatform;
use vault_chat_core::score::SearchAlgorithm;
use vault_chat_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/vault-cache.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_document_num")]
    pub document_num: usize,
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,
    #[serde(default)]
    pub chunk_enabled: bool,
    #[serde(default = "default_chunk_num")]
    pub chunk_num: usize,
    #[serde(default = "default_search_algorithm")]
    pub search_algorithm: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            document_num: default_document_num(),
            max_context_length: default_max_context_length(),
            chunk_enabled: false,
            chunk_num: default_chunk_num(),
            search_algorithm: default_search_algorithm(),
        }
    }
}

fn default_document_num() -> usize {
    5
}
fn default_max_context_length() -> usize {
    4000
}
fn default_chunk_num() -> usize {
    3
}
fn default_search_algorithm() -> String {
    "BM25".to_string()
}

impl RetrievalConfig {
    /// Ranker parameters for this configuration.
    ///
    /// Assumes the config passed [`load_config`] validation.
    pub fn search_params(&self) -> Result<SearchParams> {
        Ok(SearchParams {
            algorithm: self.search_algorithm.parse::<SearchAlgorithm>()?,
            document_num: self.document_num,
            chunk_enabled: self.chunk_enabled,
            chunk_num: self.chunk_num,
            ..SearchParams::default()
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: None,
        }
    }
}

fn default_platform() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("{} environment variable not set", self.api_key_env))
    }
}

/// `unicode` (default) produces whole-word terms; `subword` produces
/// sub-word terms from `path` and needs the `subword-tokenizer` feature.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenizerConfig {
    #[serde(default = "default_tokenizer_kind")]
    pub kind: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: default_tokenizer_kind(),
            path: None,
        }
    }
}

fn default_tokenizer_kind() -> String {
    "unicode".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    2
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.vault.include_globs.is_empty() {
        bail!("vault.include_globs must not be empty");
    }

    // Validate retrieval
    let retrieval = &config.retrieval;
    if retrieval.document_num < 1 {
        bail!("retrieval.document_num must be >= 1");
    }
    if retrieval.max_context_length < 1 {
        bail!("retrieval.max_context_length must be >= 1");
    }
    if retrieval.chunk_num < 1 {
        bail!("retrieval.chunk_num must be >= 1");
    }
    if retrieval.search_algorithm.parse::<SearchAlgorithm>().is_err() {
        bail!(
            "Unknown retrieval.search_algorithm: '{}'. Must be BM25 or TF-IDF.",
            retrieval.search_algorithm
        );
    }

    // Validate llm
    let platform: LlmPlatform = config.llm.platform.parse()?;
    platform.check_model(&config.llm.model)?;

    // Validate tokenizer
    match config.tokenizer.kind.as_str() {
        "unicode" => {}
        "subword" => {
            if config.tokenizer.path.is_none() {
                bail!("tokenizer.path must be specified when kind is 'subword'");
            }
        }
        other => bail!(
            "Unknown tokenizer kind: '{}'. Must be unicode or subword.",
            other
        ),
    }

    if config.watch.poll_interval_secs == 0 {
        bail!("watch.poll_interval_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[vault]\nroot = \"./notes\"\n").unwrap();
        assert_eq!(config.vault.include_globs, vec!["**/*.md"]);
        assert_eq!(config.retrieval.document_num, 5);
        assert_eq!(config.retrieval.max_context_length, 4000);
        assert!(!config.retrieval.chunk_enabled);
        assert_eq!(config.retrieval.chunk_num, 3);
        assert_eq!(config.llm.platform, "gemini");
        assert_eq!(config.llm.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.tokenizer.kind, "unicode");
        assert_eq!(config.watch.poll_interval_secs, 2);
        assert_eq!(config.cache.path, PathBuf::from("./data/vault-cache.json"));
    }

    #[test]
    fn test_search_params_from_config() {
        let config = parse(
            r#"
[vault]
root = "."

[retrieval]
document_num = 2
chunk_enabled = true
chunk_num = 4
search_algorithm = "TF-IDF"
"#,
        )
        .unwrap();
        let params = config.retrieval.search_params().unwrap();
        assert_eq!(params.algorithm, SearchAlgorithm::TfIdf);
        assert_eq!(params.document_num, 2);
        assert!(params.chunk_enabled);
        assert_eq!(params.chunk_num, 4);
    }

    #[test]
    fn test_rejects_zero_document_num() {
        let err = parse("[vault]\nroot = \".\"\n[retrieval]\ndocument_num = 0\n").unwrap_err();
        assert!(err.to_string().contains("document_num"));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let err = parse("[vault]\nroot = \".\"\n[retrieval]\nsearch_algorithm = \"LSA\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("search_algorithm"));
    }

    #[test]
    fn test_rejects_model_outside_catalogue() {
        assert!(parse("[vault]\nroot = \".\"\n[llm]\nmodel = \"gpt-4o\"\n").is_err());
    }

    #[test]
    fn test_subword_requires_path() {
        let err = parse("[vault]\nroot = \".\"\n[tokenizer]\nkind = \"subword\"\n").unwrap_err();
        assert!(err.to_string().contains("tokenizer.path"));
    }
}
