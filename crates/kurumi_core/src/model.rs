//! Entity types stored in the Kurumi document.
//!
//! Every entity is serialized as a camelCase JSON object and stored under its
//! id in one of the document's root maps (see [`Collection`]). Timestamps are
//! Unix milliseconds.
//!
//! ```text
//! Y.Doc
//! ├── Y.Map "vaults"    → Vault
//! ├── Y.Map "folders"   → Folder
//! ├── Y.Map "notes"     → Note
//! ├── Y.Map "people"    → Person
//! ├── Y.Map "events"    → Event
//! ├── Y.Map "templates" → Template
//! └── Y.Map "meta"      → currentVaultId, version
//! ```

use std::collections::BTreeMap;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Id of the vault every fresh document starts with.
pub const DEFAULT_VAULT_ID: &str = "default-vault";

/// Display name of the default vault.
pub const DEFAULT_VAULT_NAME: &str = "Default";

/// Length of generated entity ids.
pub const ID_LENGTH: usize = 12;

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generate a random 12 character base62 id (~71 bits of entropy).
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The keyed collections of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Vaults,
    Folders,
    Notes,
    People,
    Events,
    Templates,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Vaults,
        Collection::Folders,
        Collection::Notes,
        Collection::People,
        Collection::Events,
        Collection::Templates,
    ];

    /// Name of the root Y.Map backing this collection.
    pub fn map_name(self) -> &'static str {
        match self {
            Collection::Vaults => "vaults",
            Collection::Folders => "folders",
            Collection::Notes => "notes",
            Collection::People => "people",
            Collection::Events => "events",
            Collection::Templates => "templates",
        }
    }
}

/// A value stored in one of the document collections.
pub trait Entity: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn modified(&self) -> i64;

    fn set_modified(&mut self, modified: i64);
}

/// An entity owned by a vault.
pub trait VaultScoped: Entity {
    fn vault_id(&self) -> &str;

    fn set_vault_id(&mut self, vault_id: String);
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn modified(&self) -> i64 {
                self.modified
            }

            fn set_modified(&mut self, modified: i64) {
                self.modified = modified;
            }
        }
    };
}

macro_rules! impl_vault_scoped {
    ($ty:ty) => {
        impl VaultScoped for $ty {
            fn vault_id(&self) -> &str {
                &self.vault_id
            }

            fn set_vault_id(&mut self, vault_id: String) {
                self.vault_id = vault_id;
            }
        }
    };
}

/// Isolation boundary for all other entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Vault {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

impl Vault {
    pub fn new(name: impl Into<String>, icon: Option<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name: name.into(),
            icon,
            created: now,
            modified: now,
        }
    }

    /// The vault every fresh document starts with.
    pub fn default_vault() -> Self {
        let now = now_millis();
        Self {
            id: DEFAULT_VAULT_ID.to_string(),
            name: DEFAULT_VAULT_NAME.to_string(),
            icon: None,
            created: now,
            modified: now,
        }
    }
}

/// A folder in a vault's folder forest. `parent_id == None` is the vault root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

impl Folder {
    pub fn new(name: impl Into<String>, parent_id: Option<String>, vault_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name: name.into(),
            parent_id,
            vault_id: vault_id.into(),
            created: now,
            modified: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Markdown body
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

impl Note {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        folder_id: Option<String>,
        vault_id: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            folder_id,
            vault_id: vault_id.into(),
            created: now,
            modified: now,
        }
    }
}

/// A person referenced from note bodies as `@Name`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

impl Person {
    pub fn new(name: impl Into<String>, vault_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name: name.into(),
            vault_id: vault_id.into(),
            created: now,
            modified: now,
            ..Default::default()
        }
    }
}

/// A dated event referenced from note bodies as `//YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    pub id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

impl Event {
    pub fn new(date: impl Into<String>, vault_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            date: date.into(),
            vault_id: vault_id.into(),
            created: now,
            modified: now,
            ..Default::default()
        }
    }
}

/// Markdown body with `{variable}` placeholders used to seed new notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
        vault_id: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name: name.into(),
            description: description.into(),
            content: content.into(),
            vault_id: vault_id.into(),
            created: now,
            modified: now,
        }
    }
}

impl_entity!(Vault, Collection::Vaults);
impl_entity!(Folder, Collection::Folders);
impl_entity!(Note, Collection::Notes);
impl_entity!(Person, Collection::People);
impl_entity!(Event, Collection::Events);
impl_entity!(Template, Collection::Templates);

impl_vault_scoped!(Folder);
impl_vault_scoped!(Note);
impl_vault_scoped!(Person);
impl_vault_scoped!(Event);
impl_vault_scoped!(Template);

/// Immutable plain-value view of the whole document.
///
/// Published to subscribers after every load, mutation and merge. Maps are
/// keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSnapshot {
    pub vaults: BTreeMap<String, Vault>,
    pub folders: BTreeMap<String, Folder>,
    pub notes: BTreeMap<String, Note>,
    pub people: BTreeMap<String, Person>,
    pub events: BTreeMap<String, Event>,
    pub templates: BTreeMap<String, Template>,
    pub current_vault_id: String,
    pub version: u32,
}

impl DocumentSnapshot {
    /// The active vault, falling back to the default vault id.
    pub fn current_vault_id(&self) -> &str {
        if self.current_vault_id.is_empty() {
            DEFAULT_VAULT_ID
        } else {
            &self.current_vault_id
        }
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// True when the document holds no notes and no folders.
    pub fn is_content_empty(&self) -> bool {
        self.notes.is_empty() && self.folders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_base62() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_note_serializes_camel_case() {
        let mut note = Note::new("Title", "Body", Some("f1".into()), "v1");
        note.tags = vec!["work".into()];
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["folderId"], "f1");
        assert_eq!(json["vaultId"], "v1");
        assert_eq!(json["tags"][0], "work");
    }

    #[test]
    fn test_legacy_note_defaults_missing_fields() {
        let note: Note =
            serde_json::from_str(r#"{"id":"n1","title":"Old","content":"x","created":1,"modified":2}"#)
                .unwrap();
        assert_eq!(note.folder_id, None);
        assert_eq!(note.vault_id, "");
        assert!(note.tags.is_empty());
    }

    #[test]
    fn test_person_skips_empty_optionals() {
        let person = Person::new("Ada Lovelace", "v1");
        let json = serde_json::to_value(&person).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["customFields"], serde_json::json!({}));
    }

    #[test]
    fn test_snapshot_current_vault_falls_back_to_default() {
        let snapshot = DocumentSnapshot::default();
        assert_eq!(snapshot.current_vault_id(), DEFAULT_VAULT_ID);
        assert!(snapshot.is_content_empty());
    }
}
