//! `vchat index`: build or refresh the cache and print corpus statistics.

use anyhow::Result;

use crate::config::Config;
use crate::engine::Engine;

pub async fn run_index(config: &Config, prune: bool) -> Result<()> {
    let engine = Engine::open(config).await?;
    let cache = engine.cache();
    let report = cache.refresh(engine.store().as_ref()).await?;

    let mut pruned = 0usize;
    if prune {
        for id in &report.missing {
            if cache.remove_document(id).await {
                pruned += 1;
            }
        }
    }

    // Full recompute so the printed statistics are exact.
    cache.recompute_statistics().await;
    let index = cache.index().await;

    println!("Vault Chat: Index");
    println!("=================");
    println!();
    println!("  Vault:       {}", config.vault.root.display());
    println!("  Cache:       {}", cache.path().display());
    println!();
    println!("  Documents:   {}", index.total_documents());
    println!("  Terms:       {}", index.document_frequency().len());
    println!("  Avg length:  {:.1}", index.average_document_length());
    println!();
    println!(
        "  Added:       {}",
        cache.added_on_load() + report.added.len()
    );
    println!(
        "  Updated:     {}",
        cache.updated_on_load() + report.updated.len()
    );
    println!("  Unchanged:   {}", report.unchanged);
    if !report.skipped.is_empty() {
        println!("  Skipped:     {}", report.skipped.len());
    }
    if prune {
        println!("  Pruned:      {}", pruned);
    } else if !report.missing.is_empty() {
        println!(
            "  Missing:     {} (run with --prune to remove)",
            report.missing.len()
        );
        for id in &report.missing {
            println!("    - {}", id);
        }
    }

    let last_modified = index.entries().values().map(|e| e.modified).max();
    if let Some(date) = last_modified
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
    {
        println!();
        println!("  Last edit:   {}", date);
    }

    Ok(())
}
