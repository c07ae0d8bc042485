//! `vchat search`, `vchat context` and `vchat link`.

use anyhow::Result;

use vault_chat_core::score::SearchAlgorithm;
use vault_chat_core::search::RankedDocument;
use vault_chat_core::store::DocumentStore;

use crate::config::Config;
use crate::engine::{ContextRequest, Engine};
use crate::vault::VaultStore;

/// Command-line overrides of the `[retrieval]` settings.
#[derive(Debug, Clone, Default)]
pub struct SearchOverrides {
    pub algorithm: Option<String>,
    pub limit: Option<usize>,
    pub chunks: bool,
}

pub async fn run_search(config: &Config, query: &str, overrides: &SearchOverrides) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let mut params = config.retrieval.search_params()?;
    if let Some(algorithm) = &overrides.algorithm {
        params.algorithm = algorithm.parse::<SearchAlgorithm>()?;
    }
    if let Some(limit) = overrides.limit {
        params.document_num = limit;
    }
    params.chunk_enabled |= overrides.chunks;

    let engine = Engine::open(config).await?;
    let results = engine.search_with(query, &params).await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let index = engine.cache().index().await;
    for (i, result) in results.iter().enumerate() {
        print_result(i, result);
        if let Some(date) = index
            .get(&result.id)
            .and_then(|e| chrono::DateTime::from_timestamp(e.modified, 0))
            .map(|dt| dt.format("%Y-%m-%d").to_string())
        {
            println!("    modified: {}", date);
        }
        println!();
    }
    Ok(())
}

fn print_result(i: usize, result: &RankedDocument) {
    println!("{}. [{:.4}] {}", i + 1, result.score, result.title);
    println!("    id: {}", result.id);
    for chunk in &result.chunks {
        let heading = if chunk.title.is_empty() {
            "(preamble)"
        } else {
            chunk.title.as_str()
        };
        println!(
            "    chunk {} [{:.4}] lines {}-{}: {}",
            chunk.chunk_index,
            chunk.score,
            chunk.start_line + 1,
            chunk.end_line,
            heading
        );
    }
    let excerpt: String = result.content.chars().take(120).collect();
    println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
}

pub async fn run_context(config: &Config, query: &str, request: &ContextRequest) -> Result<()> {
    let engine = Engine::open(config).await?;
    let context = engine.context(query, request).await?;
    println!("{}", context);
    Ok(())
}

pub async fn run_link(config: &Config, text: &str) -> Result<()> {
    let store = VaultStore::new(&config.vault)?;
    match store.resolve_link(text).await? {
        Some(id) => println!("{}", id),
        None => {
            eprintln!("No document matches '{}'", text);
            std::process::exit(1);
        }
    }
    Ok(())
}
