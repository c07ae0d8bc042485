//! Tokenizer selection from configuration.
//!
//! `unicode` (default) uses the core [`UnicodeTokenizer`]. `subword` loads a
//! Hugging Face `tokenizer.json` and emits sub-word token ids; it needs the
//! `subword-tokenizer` cargo feature.

use anyhow::{bail, Result};
use std::sync::Arc;
use vault_chat_core::tokenize::{Tokenizer, UnicodeTokenizer};

use crate::config::TokenizerConfig;

pub fn create_tokenizer(config: &TokenizerConfig) -> Result<Arc<dyn Tokenizer>> {
    match config.kind.as_str() {
        "unicode" => Ok(Arc::new(UnicodeTokenizer)),
        "subword" => create_subword(config),
        other => bail!("Unknown tokenizer kind: {}", other),
    }
}

#[cfg(feature = "subword-tokenizer")]
fn create_subword(config: &TokenizerConfig) -> Result<Arc<dyn Tokenizer>> {
    let path = config
        .path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("tokenizer.path required for subword tokenizer"))?;
    Ok(Arc::new(subword::SubwordTokenizer::from_file(path)?))
}

#[cfg(not(feature = "subword-tokenizer"))]
fn create_subword(_config: &TokenizerConfig) -> Result<Arc<dyn Tokenizer>> {
    bail!(
        "Tokenizer kind 'subword' requires building with --features subword-tokenizer"
    )
}

#[cfg(feature = "subword-tokenizer")]
pub mod subword {
    use anyhow::Result;
    use std::path::Path;
    use tracing::warn;
    use vault_chat_core::tokenize::Tokenizer;

    /// Sub-word tokenizer backed by the `tokenizers` crate.
    ///
    /// Tokens are the vocabulary ids rendered as decimal strings, so two
    /// texts share a term exactly when they share a sub-word unit.
    pub struct SubwordTokenizer {
        inner: tokenizers::Tokenizer,
    }

    impl SubwordTokenizer {
        pub fn from_file(path: &Path) -> Result<Self> {
            let inner = tokenizers::Tokenizer::from_file(path)
                .map_err(|e| anyhow::anyhow!("Load tokenizer {}: {}", path.display(), e))?;
            Ok(Self { inner })
        }
    }

    impl Tokenizer for SubwordTokenizer {
        fn tokenize(&self, text: &str) -> Vec<String> {
            if text.is_empty() {
                return Vec::new();
            }
            match self.inner.encode(text, false) {
                Ok(encoding) => encoding.get_ids().iter().map(|id| id.to_string()).collect(),
                Err(e) => {
                    warn!(error = %e, "tokenization failed; treating text as empty");
                    Vec::new()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unicode() {
        let tokenizer = create_tokenizer(&TokenizerConfig::default()).unwrap();
        assert_eq!(tokenizer.tokenize("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn test_unknown_kind() {
        let config = TokenizerConfig {
            kind: "bpe".to_string(),
            path: None,
        };
        assert!(create_tokenizer(&config).is_err());
    }
}
