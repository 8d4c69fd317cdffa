//! The `.kurumi/metadata.json` side-car.
//!
//! Markdown files only carry notes. The side-car records what the file tree
//! cannot: the vault, the folder forest with stable ids, the path of every
//! note, and the vault's people and events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::markdown::note_paths;
use crate::model::{Event, Folder, Note, Person, Vault};

/// Directory holding the side-car, relative to the repository root.
pub const METADATA_DIR: &str = ".kurumi";

/// Side-car path relative to the repository root.
pub const METADATA_PATH: &str = ".kurumi/metadata.json";

/// Side-car format version.
pub const METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderInfo {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetadata {
    #[serde(default)]
    pub version: u32,
    pub vault: VaultInfo,
    #[serde(default)]
    pub folders: BTreeMap<String, FolderInfo>,
    /// Note path → note id.
    #[serde(default)]
    pub note_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub people: BTreeMap<String, Person>,
    #[serde(default)]
    pub events: BTreeMap<String, Event>,
}

impl RepoMetadata {
    /// Describe one vault's contents.
    pub fn build(
        vault: &Vault,
        folders: &[Folder],
        notes: &[Note],
        people: &[Person],
        events: &[Event],
    ) -> Self {
        Self {
            version: METADATA_VERSION,
            vault: VaultInfo {
                id: vault.id.clone(),
                name: vault.name.clone(),
                icon: vault.icon.clone(),
            },
            folders: folders
                .iter()
                .map(|f| {
                    let info = FolderInfo {
                        name: f.name.clone(),
                        parent_id: f.parent_id.clone(),
                        created: Some(f.created),
                        modified: Some(f.modified),
                    };
                    (f.id.clone(), info)
                })
                .collect(),
            note_ids: note_paths(notes, folders)
                .into_iter()
                .map(|(id, path)| (path, id))
                .collect(),
            people: people.iter().map(|p| (p.id.clone(), p.clone())).collect(),
            events: events.iter().map(|e| (e.id.clone(), e.clone())).collect(),
        }
    }

    /// Folders, people and events that are new or differ from `base`. Vault
    /// and note paths are kept as they are.
    pub fn changed_since(&self, base: &RepoMetadata) -> RepoMetadata {
        fn differing<V: Clone + PartialEq>(
            current: &BTreeMap<String, V>,
            base: &BTreeMap<String, V>,
        ) -> BTreeMap<String, V> {
            current
                .iter()
                .filter(|(id, value)| base.get(*id) != Some(*value))
                .map(|(id, value)| (id.clone(), value.clone()))
                .collect()
        }

        RepoMetadata {
            folders: differing(&self.folders, &base.folders),
            people: differing(&self.people, &base.people),
            events: differing(&self.events, &base.events),
            ..self.clone()
        }
    }

    /// Parse a side-car. Malformed content is logged and yields `None`.
    pub fn parse(json: &str) -> Option<Self> {
        match serde_json::from_str(json) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::warn!("Ignoring unparsable {}: {}", METADATA_PATH, e);
                None
            }
        }
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self).map(|mut json| {
            json.push('\n');
            json
        })
    }
}
