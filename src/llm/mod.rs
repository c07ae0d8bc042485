//! LLM service construction.
//!
//! Use [`create_service`] to instantiate the service for a platform, or
//! [`service_from_config`] to build it from `[llm]` settings (which also
//! reads the API key from the environment).
//!
//! | Platform | Service |
//! |----------|---------|
//! | `gemini` | [`gemini::GeminiService`] |

pub mod gemini;

use anyhow::Result;
use vault_chat_core::llm::{LlmPlatform, LlmService};

use crate::config::LlmConfig;

/// Build the service for `platform`. `base_url` overrides the public endpoint.
pub fn create_service(
    platform: LlmPlatform,
    api_key: String,
    base_url: Option<&str>,
) -> Box<dyn LlmService> {
    match platform {
        LlmPlatform::Gemini => Box::new(gemini::GeminiService::new(
            api_key,
            base_url.unwrap_or(gemini::DEFAULT_BASE_URL),
        )),
    }
}

pub fn service_from_config(config: &LlmConfig) -> Result<Box<dyn LlmService>> {
    let platform: LlmPlatform = config.platform.parse()?;
    platform.check_model(&config.model)?;
    let api_key = config.api_key()?;
    Ok(create_service(platform, api_key, config.base_url.as_deref()))
}
