//! Heading-boundary document chunker.
//!
//! Splits a Markdown document into [`Chunk`]s at top-level (`# `) headings so
//! sections can be scored independently.
//!
//! # Algorithm
//!
//! 1. Walk the document line by line, tracking fenced code blocks.
//! 2. A line outside a fence that is an ATX level-1 heading starts a new chunk.
//! 3. Every other line is appended to the current chunk.
//! 4. Lines before the first heading form a chunk with an empty title.
//!
//! Chunks are disjoint, contiguous, in document order, and together cover
//! every line. An empty document yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use vault_chat_core::chunk::chunk_by_headings;
//!
//! let chunks = chunk_by_headings("notes.md", "intro\n# One\nbody\n# Two");
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[0].title, "");
//! assert_eq!(chunks[1].title, "One");
//! assert_eq!(chunks[1].text, "# One\nbody");
//! ```

use crate::models::Chunk;

/// Split `text` into heading-delimited chunks.
pub fn chunk_by_headings(document_id: &str, text: &str) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks = Vec::new();
    let mut fence: Option<&str> = None;
    let mut start = 0usize;
    let mut title = String::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(marker) = fence_marker(line) {
            match fence {
                Some(open) if marker.starts_with(open) => fence = None,
                None => fence = Some(marker),
                _ => {}
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }
        if let Some(heading) = top_level_heading(line) {
            if i > start {
                chunks.push(make_chunk(document_id, chunks.len(), &title, &lines, start, i));
            }
            start = i;
            title = heading.to_string();
        }
    }
    chunks.push(make_chunk(
        document_id,
        chunks.len(),
        &title,
        &lines,
        start,
        lines.len(),
    ));

    chunks
}

/// Heading text if `line` is an ATX level-1 heading.
fn top_level_heading(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = line[indent..].strip_prefix('#')?;
    if rest.is_empty() {
        return Some("");
    }
    if !rest.starts_with([' ', '\t']) {
        // "##", "#tag"
        return None;
    }
    let heading = rest.trim();
    // Optional closing sequence: "# Title #", but not "# C#"
    let stripped = heading.trim_end_matches('#');
    if stripped.is_empty() || stripped.ends_with([' ', '\t']) {
        return Some(stripped.trim_end());
    }
    Some(heading)
}

/// The fence run (```` ``` ```` or `~~~`, possibly longer) opening a line.
fn fence_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    for ch in ['`', '~'] {
        let run = trimmed.len() - trimmed.trim_start_matches(ch).len();
        if run >= 3 {
            return Some(&trimmed[..run]);
        }
    }
    None
}

fn make_chunk(
    document_id: &str,
    index: usize,
    title: &str,
    lines: &[&str],
    start: usize,
    end: usize,
) -> Chunk {
    Chunk {
        document_id: document_id.to_string(),
        chunk_index: index,
        title: title.to_string(),
        start_line: start,
        end_line: end,
        text: lines[start..end].join("\n"),
    }
}
