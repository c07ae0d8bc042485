//! Modification watcher (`vchat watch`).
//!
//! Polls the document store's listing on a fixed interval and sends the id
//! of every document whose staleness key changed (or that appeared) through
//! an mpsc channel. A single consumer applies the signals in arrival order,
//! so recomputes never overlap.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vault_chat_core::models::DocumentMeta;
use vault_chat_core::store::DocumentStore;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::engine::Engine;

/// Ids whose staleness key differs from `known`; updates `known` in place.
fn diff_listing(known: &mut HashMap<String, i64>, listing: Vec<DocumentMeta>) -> Vec<String> {
    let mut changed = Vec::new();
    for meta in listing {
        if known.get(&meta.id) != Some(&meta.modified) {
            changed.push(meta.id.clone());
            known.insert(meta.id, meta.modified);
        }
    }
    changed
}

/// Spawn the polling task and return the receiving end of its signals.
///
/// The first poll only records the baseline. The task exits when the
/// receiver is dropped.
pub fn spawn_watcher(store: Arc<dyn DocumentStore>, interval: Duration) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut known: HashMap<String, i64> = HashMap::new();
        let mut ticker = tokio::time::interval(interval);
        let mut baseline = true;
        loop {
            ticker.tick().await;
            let listing = match store.list_documents().await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(error = %e, "vault poll failed");
                    continue;
                }
            };
            let changed = diff_listing(&mut known, listing);
            if std::mem::take(&mut baseline) {
                continue;
            }
            for id in changed {
                if tx.send(id).await.is_err() {
                    debug!("watch receiver dropped; stopping poller");
                    return;
                }
            }
        }
    });
    rx
}

/// Apply modification signals until the channel closes.
///
/// A signal that cannot be applied is logged and dropped; the next change to
/// the same document retries it.
pub async fn apply_signals(
    cache: &CacheStore,
    store: &dyn DocumentStore,
    mut signals: mpsc::Receiver<String>,
) {
    while let Some(id) = signals.recv().await {
        if cache.index().await.contains(&id) {
            match cache.on_document_modified(store, &id).await {
                Ok(true) => info!(id = %id, "document recomputed"),
                Ok(false) => {}
                Err(e) => warn!(id = %id, error = %e, "failed to apply modification"),
            }
        } else {
            // New documents change corpus membership; refresh recomputes statistics.
            match cache.refresh(store).await {
                Ok(_) => info!(id = %id, "document added"),
                Err(e) => warn!(id = %id, error = %e, "vault refresh failed"),
            }
        }
    }
}

pub async fn run_watch(config: &Config) -> Result<()> {
    let engine = Engine::open(config).await?;
    engine.cache().refresh(engine.store().as_ref()).await?;

    let interval = Duration::from_secs(config.watch.poll_interval_secs);
    let signals = spawn_watcher(engine.store().clone(), interval);
    println!(
        "Watching {} (every {}s, Ctrl-C to stop)",
        config.vault.root.display(),
        config.watch.poll_interval_secs
    );

    tokio::select! {
        _ = apply_signals(engine.cache(), engine.store().as_ref(), signals) => Ok(()),
        _ = tokio::signal::ctrl_c() => {
            println!("Stopped.");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use vault_chat_core::store::memory::InMemoryDocumentStore;
    use vault_chat_core::tokenize::UnicodeTokenizer;

    /// In-memory store whose listing can be switched to fail.
    struct FlakyListing {
        inner: InMemoryDocumentStore,
        fail_listing: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyListing {
        async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
            if self.fail_listing.load(Ordering::SeqCst) {
                anyhow::bail!("vault unavailable");
            }
            self.inner.list_documents().await
        }

        async fn metadata(&self, id: &str) -> Result<DocumentMeta> {
            self.inner.metadata(id).await
        }

        async fn read(&self, id: &str) -> Result<String> {
            self.inner.read(id).await
        }

        async fn resolve_link(&self, text: &str) -> Result<Option<String>> {
            self.inner.resolve_link(text).await
        }
    }

    fn meta(id: &str, modified: i64) -> DocumentMeta {
        DocumentMeta {
            id: id.to_string(),
            title: id.to_string(),
            modified,
        }
    }

    #[test]
    fn test_diff_listing() {
        let mut known = HashMap::new();
        assert_eq!(
            diff_listing(&mut known, vec![meta("a", 1), meta("b", 1)]),
            vec!["a", "b"]
        );
        assert!(diff_listing(&mut known, vec![meta("a", 1), meta("b", 1)]).is_empty());
        assert_eq!(
            diff_listing(&mut known, vec![meta("a", 2), meta("b", 1)]),
            vec!["a"]
        );
    }

    #[tokio::test]
    async fn test_watcher_signals_modification() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.put("a.md", "a", "one");
        let mut rx = spawn_watcher(store.clone(), Duration::from_millis(10));

        // Let the baseline poll run before changing anything.
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.put("a.md", "a", "two");

        let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, "a.md");
    }

    #[tokio::test]
    async fn test_apply_signals_in_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = InMemoryDocumentStore::new();
        store.put("a.md", "a", "apple");
        let cache = CacheStore::load_or_initialize(
            &tmp.path().join("cache.json"),
            &store,
            Arc::new(UnicodeTokenizer),
        )
        .await
        .unwrap();

        store.put("a.md", "a", "avocado");
        store.put("b.md", "b", "banana");
        let (tx, rx) = mpsc::channel(4);
        tx.send("a.md".to_string()).await.unwrap();
        tx.send("b.md".to_string()).await.unwrap();
        drop(tx);

        apply_signals(&cache, &store, rx).await;
        let index = cache.index().await;
        assert_eq!(index.get("a.md").unwrap().terms, vec!["avocado"]);
        assert!(index.contains("b.md"));
        assert_eq!(index.total_documents(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_consuming_signals() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FlakyListing {
            inner: InMemoryDocumentStore::new(),
            fail_listing: AtomicBool::new(false),
        };
        store.inner.put("a.md", "a", "apple");
        let cache = CacheStore::load_or_initialize(
            &tmp.path().join("cache.json"),
            &store,
            Arc::new(UnicodeTokenizer),
        )
        .await
        .unwrap();

        store.fail_listing.store(true, Ordering::SeqCst);
        store.inner.put("b.md", "b", "banana");
        store.inner.put("a.md", "a", "avocado");
        let (tx, rx) = mpsc::channel(4);
        tx.send("b.md".to_string()).await.unwrap();
        tx.send("a.md".to_string()).await.unwrap();
        drop(tx);

        apply_signals(&cache, &store, rx).await;
        let index = cache.index().await;
        assert!(!index.contains("b.md"));
        assert_eq!(index.get("a.md").unwrap().terms, vec!["avocado"]);
    }
}
