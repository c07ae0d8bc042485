//! Text generation service abstraction.
//!
//! Concrete services (Gemini) live in the `vault-chat` app crate and are
//! selected by a factory keyed on [`LlmPlatform`]. Adding a platform means
//! adding a variant and an implementation of [`LlmService`].

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::models::ConversationTurn;
use crate::EngineError;

/// A pull-based sequence of text deltas, delivered in FIFO order.
///
/// Dropping the stream is the only cancellation mechanism; implementations
/// release their resources on drop.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Inputs for a single generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub query: &'a str,
    /// Working history: ephemeral preamble followed by persisted turns.
    pub history: &'a [ConversationTurn],
    pub model: &'a str,
}

#[async_trait]
pub trait LlmService: Send + Sync {
    /// Platform identifier (e.g. `"gemini"`).
    fn platform(&self) -> &str;

    /// Generate a complete response.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;

    /// Generate a response as a stream of deltas.
    async fn generate_stream(&self, request: &GenerationRequest<'_>) -> Result<DeltaStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmModel {
    pub id: &'static str,
    pub name: &'static str,
}

/// Supported generation platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmPlatform {
    #[default]
    Gemini,
}

const GEMINI_MODELS: &[LlmModel] = &[
    LlmModel {
        id: "gemini-1.5-flash-exp-0827",
        name: "Gemini 1.5 Flash Experimental",
    },
    LlmModel {
        id: "gemini-1.5-flash",
        name: "Gemini 1.5 Flash",
    },
    LlmModel {
        id: "gemini-1.5-pro",
        name: "Gemini 1.5 Pro",
    },
    LlmModel {
        id: "gemini-2.0-flash-exp",
        name: "Gemini 2.0 Flash Experimental",
    },
];

impl LlmPlatform {
    pub const ALL: &'static [LlmPlatform] = &[LlmPlatform::Gemini];

    pub fn id(&self) -> &'static str {
        match self {
            LlmPlatform::Gemini => "gemini",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LlmPlatform::Gemini => "Google Gemini",
        }
    }

    pub fn models(&self) -> &'static [LlmModel] {
        match self {
            LlmPlatform::Gemini => GEMINI_MODELS,
        }
    }

    /// Fail with [`EngineError::UnknownModel`] unless `model` is in the catalogue.
    pub fn check_model(&self, model: &str) -> Result<()> {
        if self.models().iter().any(|m| m.id == model) {
            Ok(())
        } else {
            Err(EngineError::UnknownModel {
                platform: self.id().to_string(),
                model: model.to_string(),
            }
            .into())
        }
    }
}

impl std::str::FromStr for LlmPlatform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        LlmPlatform::ALL
            .iter()
            .copied()
            .find(|p| p.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::UnknownPlatform(s.to_string()).into())
    }
}
