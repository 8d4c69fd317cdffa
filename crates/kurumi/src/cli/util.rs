//! Shared utilities for CLI commands

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use kurumi_core::config::Config;
use kurumi_core::crdt::SqliteStorage;
use kurumi_core::model::{Folder, Note, Template, Vault};
use kurumi_core::sync::SyncStatus;
use kurumi_core::{DocumentStore, KurumiError};
use thiserror::Error;

/// Errors reported by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] KurumiError),

    #[error("No {kind} matches '{query}'")]
    NotFound { kind: &'static str, query: String },

    #[error("'{query}' matches {count} {kind}s, use the id instead")]
    Ambiguous {
        kind: &'static str,
        query: String,
        count: usize,
    },

    #[error("Editor '{editor}' failed: {message}")]
    Editor { editor: String, message: String },

    #[error("Sync failed: {0}")]
    SyncFailed(String),

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

pub type CliResult<T> = std::result::Result<T, CliError>;

/// Loaded configuration plus command-line overrides.
pub struct CliContext {
    pub config: Config,
    pub config_path: PathBuf,
    data_dir_override: Option<PathBuf>,
}

impl CliContext {
    pub fn load(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> CliResult<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Config::config_path().ok_or(KurumiError::NoConfigDir)?,
        };
        let config = if config_path.exists() {
            Config::load_from(&config_path)?
        } else {
            Config::default()
        };
        Ok(Self {
            config,
            config_path,
            data_dir_override: data_dir,
        })
    }

    /// The configuration with `--data-dir` applied. Never saved.
    pub fn effective_config(&self) -> Config {
        let mut config = self.config.clone();
        if let Some(dir) = &self.data_dir_override {
            config.data_dir = Some(dir.clone());
        }
        config
    }

    pub fn save_config(&self) -> CliResult<()> {
        self.config.save_to(&self.config_path)?;
        Ok(())
    }

    pub fn data_dir(&self) -> CliResult<PathBuf> {
        Ok(self.effective_config().data_dir()?)
    }

    /// Open the SQLite-backed document store, creating the data directory.
    pub fn open_store(&self) -> CliResult<DocumentStore> {
        let config = self.effective_config();
        std::fs::create_dir_all(config.data_dir()?).map_err(KurumiError::from)?;
        let storage = SqliteStorage::open(config.database_path()?)?;
        Ok(DocumentStore::open(Arc::new(storage))?)
    }

    /// Run `f` against the store and wait for its writes to land.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut DocumentStore) -> CliResult<T>) -> CliResult<T> {
        let mut store = self.open_store()?;
        let result = f(&mut store);
        store.teardown();
        result
    }

    fn status_path(&self) -> CliResult<PathBuf> {
        Ok(self.data_dir()?.join("sync-status.json"))
    }

    /// Outcome of the last sync cycle, if any was recorded.
    pub fn load_sync_status(&self) -> SyncStatus {
        let Ok(path) = self.status_path() else {
            return SyncStatus::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable sync status {}: {}", path.display(), e);
                SyncStatus::default()
            }),
            Err(_) => SyncStatus::default(),
        }
    }

    pub fn save_sync_status(&self, status: &SyncStatus) -> CliResult<()> {
        let path = self.status_path()?;
        let json = serde_json::to_string_pretty(status).map_err(KurumiError::from)?;
        std::fs::write(&path, json).map_err(|source| KurumiError::FileWrite { path, source })?;
        Ok(())
    }
}

/// Pick the single candidate whose id equals `query`, or else whose name
/// matches it case-insensitively.
fn resolve<T: Clone>(
    kind: &'static str,
    query: &str,
    candidates: &[T],
    id: impl Fn(&T) -> &str,
    name: impl Fn(&T) -> &str,
) -> CliResult<T> {
    if let Some(found) = candidates.iter().find(|c| id(c) == query) {
        return Ok(found.clone());
    }
    let wanted = query.to_lowercase();
    let matches: Vec<&T> = candidates
        .iter()
        .filter(|c| name(c).to_lowercase() == wanted)
        .collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Err(CliError::NotFound {
            kind,
            query: query.to_string(),
        }),
        many => Err(CliError::Ambiguous {
            kind,
            query: query.to_string(),
            count: many.len(),
        }),
    }
}

pub fn resolve_vault(store: &DocumentStore, query: &str) -> CliResult<Vault> {
    resolve("vault", query, &store.vaults(), |v| v.id.as_str(), |v| v.name.as_str())
}

/// Notes are looked up by id across vaults, by title in the active vault.
pub fn resolve_note(store: &DocumentStore, query: &str) -> CliResult<Note> {
    if let Some(note) = store.get_note(query) {
        return Ok(note);
    }
    resolve("note", query, &store.notes(), |n| n.id.as_str(), |n| n.title.as_str())
}

pub fn resolve_folder(store: &DocumentStore, query: &str) -> CliResult<Folder> {
    resolve("folder", query, &store.folders(), |f| f.id.as_str(), |f| f.name.as_str())
}

pub fn resolve_template(store: &DocumentStore, query: &str) -> CliResult<Template> {
    resolve("template", query, &store.templates(), |t| t.id.as_str(), |t| t.name.as_str())
}

/// Local date and time of a Unix millisecond timestamp
pub fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Hide all but the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurumi_core::crdt::MemoryStorage;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("ghp_abcdef123456"), "************3456");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_resolve_by_id_then_name() {
        let mut store = DocumentStore::open(Arc::new(MemoryStorage::new())).unwrap();
        let work = store.add_folder("Work", None).unwrap();
        store.add_folder("work", Some(work.id.as_str())).unwrap();
        store.add_folder("Home", None).unwrap();

        assert_eq!(resolve_folder(&store, &work.id).unwrap().id, work.id);
        assert_eq!(resolve_folder(&store, "HOME").unwrap().name, "Home");
        assert!(matches!(
            resolve_folder(&store, "work"),
            Err(CliError::Ambiguous { count: 2, .. })
        ));
        assert!(matches!(
            resolve_folder(&store, "Garden"),
            Err(CliError::NotFound { kind: "folder", .. })
        ));
    }

    #[test]
    fn test_resolve_note_by_title() {
        let mut store = DocumentStore::open(Arc::new(MemoryStorage::new())).unwrap();
        let note = store.add_note("Groceries", "milk", None).unwrap();
        assert_eq!(resolve_note(&store, "groceries").unwrap().id, note.id);
        assert_eq!(resolve_note(&store, &note.id).unwrap().title, "Groceries");
    }
}
