//! Google Gemini `generateContent` client.
//!
//! The working history is sent as `contents` (roles `user` / `model`) with
//! the query appended as the final user turn. Streaming uses
//! `:streamGenerateContent?alt=sse` and decodes `data:` lines as they
//! arrive; dropping the returned stream closes the connection.
//!
//! No retries and no client timeout: a failed request is reported once.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vault_chat_core::llm::{DeltaStream, GenerationRequest, LlmService};
use vault_chat_core::models::ConversationTurn;
use vault_chat_core::EngineError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiService {
    pub fn new(api_key: String, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(&self, url: &str, request: &GenerationRequest<'_>) -> Result<reqwest::Response> {
        let query = ConversationTurn::user(request.query);
        let body = GeminiRequest::new(request.history, &query);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::generation(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(
                EngineError::generation(format!("Gemini API error {}: {}", status, body_text))
                    .into(),
            );
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmService for GeminiService {
    fn platform(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let url = self.endpoint(request.model, "generateContent");
        debug!(%url, "gemini generate");
        let response = self.post(&url, request).await?;
        let json: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::generation(format!("Invalid Gemini response: {}", e)))?;
        json.into_text()
    }

    async fn generate_stream(&self, request: &GenerationRequest<'_>) -> Result<DeltaStream> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(request.model, "streamGenerateContent")
        );
        debug!(%url, "gemini stream");
        let response = self.post(&url, request).await?;

        let mut decoder = SseDecoder::default();
        let deltas = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.push(&bytes),
                Err(e) => vec![Err(EngineError::generation(format!(
                    "Gemini stream interrupted: {}",
                    e
                ))
                .into())],
            })
            .flat_map(stream::iter);
        Ok(Box::pin(deltas))
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<&'a ConversationTurn>,
}

impl<'a> GeminiRequest<'a> {
    /// History followed by the query as the final user turn.
    fn new(history: &'a [ConversationTurn], query: &'a ConversationTurn) -> Self {
        Self {
            contents: history.iter().chain(std::iter::once(query)).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    message: String,
}

impl GeminiResponse {
    /// Text of the first candidate; an error when there is none.
    fn into_text(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(
                EngineError::generation(format!("Gemini error: {}", error.message)).into(),
            );
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::generation("Gemini returned no candidates"))?;
        Ok(candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

/// Incremental decoder for Gemini's server-sent events.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters and JSON payloads split across network chunks decode intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            match serde_json::from_str::<GeminiResponse>(data) {
                // Metadata-only events (e.g. final usage counts).
                Ok(response) if response.error.is_none() && response.candidates.is_empty() => {}
                Ok(response) => match response.into_text() {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => deltas.push(Ok(text)),
                    Err(e) => deltas.push(Err(e)),
                },
                Err(e) => deltas.push(Err(EngineError::generation(format!(
                    "Invalid Gemini stream event: {}",
                    e
                ))
                .into())),
            }
        }
        deltas
    }
}
