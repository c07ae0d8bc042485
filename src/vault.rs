//! Filesystem vault: a [`DocumentStore`] over a directory of Markdown notes.
//!
//! Walks `vault.root` recursively, applies include/exclude globs against the
//! vault-relative path, and lists documents in sorted id order. The id is the
//! relative path with `/` separators; the title is the file stem; the
//! staleness key is the file's modification time in Unix seconds.
//!
//! `.git`, `.obsidian`, `.trash` and `node_modules` directories are always
//! excluded. Files that cannot be inspected are logged and skipped.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use vault_chat_core::models::DocumentMeta;
use vault_chat_core::store::{resolve_in, DocumentStore};
use vault_chat_core::EngineError;

use crate::config::VaultConfig;

pub struct VaultStore {
    root: PathBuf,
    include_set: GlobSet,
    exclude_set: GlobSet,
    follow_symlinks: bool,
}

impl VaultStore {
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let root = &config.root;
        if !root.exists() {
            bail!("Vault root does not exist: {}", root.display());
        }

        let include_set = build_globset(&config.include_globs)?;

        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/.obsidian/**".to_string(),
            "**/.trash/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(config.exclude_globs.clone());
        let exclude_set = build_globset(&default_excludes)?;

        Ok(Self {
            root: root.clone(),
            include_set,
            exclude_set,
            follow_symlinks: config.follow_symlinks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&self) -> Result<Vec<DocumentMeta>> {
        let mut docs = Vec::new();

        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable vault entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let id = relative_id(relative);

            if self.exclude_set.is_match(&id) || !self.include_set.is_match(&id) {
                continue;
            }

            match file_meta(path, id) {
                Ok(meta) => docs.push(meta),
                Err(e) => warn!(error = %e, "skipping document"),
            }
        }

        // Sort for deterministic ordering
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    /// Map an id back to a path, refusing ids that escape the vault root.
    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.is_empty() || escapes {
            return Err(store_error(id, "document id is not a vault-relative path"));
        }
        Ok(self.root.join(relative))
    }

    fn is_listed(&self, id: &str) -> bool {
        !self.exclude_set.is_match(id) && self.include_set.is_match(id)
    }
}

#[async_trait]
impl DocumentStore for VaultStore {
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        self.scan()
            .with_context(|| format!("Failed to scan vault: {}", self.root.display()))
    }

    async fn metadata(&self, id: &str) -> Result<DocumentMeta> {
        if !self.is_listed(id) {
            return Err(store_error(id, "not part of the vault"));
        }
        let path = self.path_for(id)?;
        file_meta(&path, id.to_string())
    }

    async fn read(&self, id: &str) -> Result<String> {
        let path = self.path_for(id)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| store_error(id, &e.to_string()))
    }

    async fn resolve_link(&self, text: &str) -> Result<Option<String>> {
        let docs = self.scan()?;
        Ok(resolve_in(docs.iter().map(|d| d.id.as_str()), text))
    }
}

fn relative_id(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_meta(path: &Path, id: String) -> Result<DocumentMeta> {
    let metadata = std::fs::metadata(path).map_err(|e| store_error(&id, &e.to_string()))?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let modified_secs = modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let title = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(DocumentMeta {
        id,
        title,
        modified: modified_secs,
    })
}

fn store_error(id: &str, message: &str) -> anyhow::Error {
    EngineError::DocumentStore {
        id: id.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
