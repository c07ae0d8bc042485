//! Text tokenization.
//!
//! Statistics operate over raw tokens: no stemming, no stop-word removal.
//!
//! The default [`UnicodeTokenizer`] works at whole-word granularity, not
//! sub-word: `"tokenization"` is one term, so it does not match
//! `"tokenize"`. Sub-word terms come from the app's `subword` tokenizer kind
//! (a Hugging Face `tokenizer.json`), which is only compiled with the
//! `subword-tokenizer` feature. Switching kinds changes every term, so the
//! cache file must be rebuilt.
//! A tokenizer must be deterministic and order-preserving, and must never
//! fail the caller; implementations that can fail internally log the error
//! and return an empty sequence.
//!
//! # Example
//!
//! ```rust
//! use vault_chat_core::tokenize::{Tokenizer, UnicodeTokenizer};
//!
//! let tokens = UnicodeTokenizer.tokenize("Rust's ownership, explained");
//! assert_eq!(tokens, vec!["rust's", "ownership", "explained"]);
//! ```

use unicode_segmentation::UnicodeSegmentation;

/// Deterministic text → token sequence function.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercased Unicode word segmentation (UAX #29).
///
/// Punctuation and whitespace are dropped; scripts without spaces
/// (Hangul, Han) are segmented by the Unicode word rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeTokenizer;

impl Tokenizer for UnicodeTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        text.unicode_words().map(|w| w.to_lowercase()).collect()
    }
}
