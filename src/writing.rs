//! Writing assistants: continue a document and draw a mermaid flowchart.
//!
//! Both send the relevant document text as the request context through the
//! same [`ChatSession`] used for questions, so they share its history rules.

use anyhow::{Context, Result};
use tracing::warn;

use vault_chat_core::llm::LlmService;
use vault_chat_core::session::ChatSession;

use crate::config::Config;
use crate::engine::Engine;
use crate::llm::service_from_config;

pub const CONTINUE_QUERY: &str = "Continue writing the text above.";

pub fn flowchart_query(request: &str) -> String {
    format!(
        "Use ```mermaid ``` to draw a flow chart that meets the following requirements:{}",
        request
    )
}

/// Minimal diagram inserted when generation fails.
pub fn fallback_flowchart(request: &str) -> String {
    format!("```mermaid\nflowchart TD\n{}\n```", request)
}

/// Byte offset of the `cursor`-th character, clamped to the end.
fn char_offset(text: &str, cursor: Option<usize>) -> usize {
    match cursor {
        Some(n) => text
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(text.len()),
        None => text.len(),
    }
}

/// Generate a continuation of `text` at `cursor` (a character offset,
/// default end of text). Only the text before the cursor is sent.
pub async fn continue_writing(
    session: &mut ChatSession,
    llm: &dyn LlmService,
    text: &str,
    cursor: Option<usize>,
) -> Result<String> {
    let before = &text[..char_offset(text, cursor)];
    session.ask(llm, CONTINUE_QUERY, before, None).await
}

/// Ask for a mermaid flowchart of `document` meeting `request`.
///
/// Never fails: a generation error yields [`fallback_flowchart`].
pub async fn flowchart(
    session: &mut ChatSession,
    llm: &dyn LlmService,
    document: &str,
    request: &str,
) -> String {
    match session
        .ask(llm, &flowchart_query(request), document, None)
        .await
    {
        Ok(diagram) => diagram,
        Err(e) => {
            warn!(error = %e, "flowchart generation failed; using fallback");
            fallback_flowchart(request)
        }
    }
}

/// Splice `insert` into `text` at character offset `cursor`.
pub fn insert_at(text: &str, cursor: Option<usize>, insert: &str) -> String {
    let at = char_offset(text, cursor);
    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..at]);
    out.push_str(insert);
    out.push_str(&text[at..]);
    out
}

pub async fn run_continue(
    config: &Config,
    id: &str,
    cursor: Option<usize>,
    write: bool,
) -> Result<()> {
    let engine = Engine::open(config).await?;
    let llm = service_from_config(&config.llm)?;
    let mut session = ChatSession::new(&config.llm.model);

    let text = engine.store().read(id).await?;
    let continuation = continue_writing(&mut session, llm.as_ref(), &text, cursor).await?;

    if write {
        let path = config.vault.root.join(id);
        std::fs::write(&path, insert_at(&text, cursor, &continuation))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        engine.cache().on_document_modified(engine.store().as_ref(), id).await?;
        println!("Inserted {} characters into {}", continuation.chars().count(), id);
    } else {
        println!("{}", continuation);
    }
    Ok(())
}

pub async fn run_flowchart(config: &Config, id: &str, request: &str) -> Result<()> {
    let engine = Engine::open(config).await?;
    let llm = service_from_config(&config.llm)?;
    let mut session = ChatSession::new(&config.llm.model);

    let document = engine.store().read(id).await?;
    println!("{}", flowchart(&mut session, llm.as_ref(), &document, request).await);
    Ok(())
}
