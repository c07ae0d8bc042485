//! Context assembly.
//!
//! The context sent alongside a query is a fixed sequence of blocks joined
//! by [`SEPARATOR`]:
//!
//! 1. the currently open document (empty when none),
//! 2. the selected text (empty when none),
//! 3. one block per ranked document, best first.
//!
//! The joined string is then cut to `max_length` characters. The cut is a
//! literal prefix and may land mid-word.

use crate::search::RankedDocument;

pub const SEPARATOR: &str = "\n\n---\n\n";

/// A document the user currently has open.
#[derive(Debug, Clone, Copy)]
pub struct OpenDocument<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

/// Everything that goes into one context string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextInputs<'a> {
    pub current: Option<OpenDocument<'a>>,
    pub selection: Option<&'a str>,
    pub results: &'a [RankedDocument],
}

pub fn current_document_block(doc: Option<&OpenDocument<'_>>) -> String {
    match doc {
        Some(doc) => format!(
            "::: Current Opened Document Path :::\n{}\n\n::: Current Opened Document Content :::\n{}\n",
            doc.path, doc.content
        ),
        None => String::new(),
    }
}

pub fn selection_block(selection: Option<&str>) -> String {
    match selection {
        Some(text) if !text.is_empty() => format!("::: Selected Text :::\n{}\n", text),
        _ => String::new(),
    }
}

pub fn result_block(doc: &RankedDocument) -> String {
    format!(
        "::: Document Path :::\n{}\n\n::: Document Content :::\n{}\n",
        doc.id, doc.content
    )
}

/// Join all blocks without truncation.
pub fn assemble(inputs: &ContextInputs<'_>) -> String {
    let mut blocks = Vec::with_capacity(inputs.results.len() + 2);
    blocks.push(current_document_block(inputs.current.as_ref()));
    blocks.push(selection_block(inputs.selection));
    blocks.extend(inputs.results.iter().map(result_block));
    blocks.join(SEPARATOR)
}

/// Keep at most `max_length` characters of `context`.
pub fn truncate(context: &str, max_length: usize) -> &str {
    match context.char_indices().nth(max_length) {
        Some((byte_idx, _)) => &context[..byte_idx],
        None => context,
    }
}

/// [`assemble`] followed by [`truncate`].
pub fn build_context(inputs: &ContextInputs<'_>, max_length: usize) -> String {
    let full = assemble(inputs);
    truncate(&full, max_length).to_string()
}
