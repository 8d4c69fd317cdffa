//! JSON backup export and import, and the bulk import used by git sync.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DocumentStore, active_vault_id, views};
use crate::crdt::{DocTxn, repair_vault_invariants};
use crate::error::{KurumiError, Result};
use crate::model::{
    Collection, Entity, Event, Folder, Note, Person, Template, Vault, VaultScoped, generate_id,
    now_millis,
};

/// The full backup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub exported_at: String,
    pub vaults: Vec<Vault>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    pub notes: Vec<Note>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

/// What to do when an imported entity's id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Replace the existing entity.
    Overwrite,
    /// Import under a fresh id.
    Duplicate,
    /// Keep the existing entity.
    #[default]
    Skip,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "duplicate" => Ok(Self::Duplicate),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "unknown conflict policy '{}' (expected overwrite, duplicate or skip)",
                other
            )),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overwrite => "overwrite",
            Self::Duplicate => "duplicate",
            Self::Skip => "skip",
        })
    }
}

/// An imported vault whose id already exists locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConflict {
    pub imported_vault: Vault,
    pub existing_vault: Vault,
}

/// Result of [`DocumentStore::analyze_import`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAnalysis {
    pub has_conflicts: bool,
    pub vault_conflicts: Vec<VaultConflict>,
    pub new_vaults: Vec<Vault>,
    pub total_folders: usize,
    pub total_notes: usize,
}

/// Number of entities written per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub vaults: usize,
    pub folders: usize,
    pub notes: usize,
    pub people: usize,
    pub events: usize,
    pub templates: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.vaults + self.folders + self.notes + self.people + self.events + self.templates
    }
}

/// Entities produced outside the store, upserted by [`DocumentStore::import_entities`].
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub folders: Vec<Folder>,
    pub notes: Vec<Note>,
    pub people: Vec<Person>,
    pub events: Vec<Event>,
}

/// Parse a backup file. A bare array is a legacy list of notes.
fn parse_import(json: &str) -> Result<ExportData> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| KurumiError::InvalidImport(format!("invalid JSON: {}", e)))?;

    match value {
        Value::Array(_) => {
            let notes: Vec<Note> = serde_json::from_value(value)
                .map_err(|e| KurumiError::InvalidImport(format!("invalid note list: {}", e)))?;
            Ok(ExportData {
                version: 0,
                exported_at: String::new(),
                vaults: Vec::new(),
                folders: Vec::new(),
                notes,
                people: Vec::new(),
                events: Vec::new(),
                templates: Vec::new(),
            })
        }
        Value::Object(ref object) if object.contains_key("vaults") && object.contains_key("notes") => {
            serde_json::from_value(value)
                .map_err(|e| KurumiError::InvalidImport(format!("invalid export file: {}", e)))
        }
        _ => Err(KurumiError::InvalidImport(
            "expected a full export or an array of notes".to_string(),
        )),
    }
}

/// Fill in the id and timestamps of an entity that lacks them.
macro_rules! fill_in {
    ($entity:expr) => {{
        let entity = $entity;
        let now = now_millis();
        if entity.id.is_empty() {
            entity.id = generate_id();
        }
        if entity.created == 0 {
            entity.created = now;
        }
        if entity.modified == 0 {
            entity.modified = now;
        }
    }};
}

/// Id remapping state for one import run.
struct Importer<'a, 'doc> {
    txn: &'a mut DocTxn<'doc>,
    policy: ConflictPolicy,
    active_vault: String,
    known_vaults: BTreeSet<String>,
    vault_ids: HashMap<String, String>,
    folder_ids: HashMap<String, String>,
}

impl Importer<'_, '_> {
    fn target_vault(&self, vault_id: &str) -> String {
        if let Some(mapped) = self.vault_ids.get(vault_id) {
            return mapped.clone();
        }
        if self.known_vaults.contains(vault_id) {
            vault_id.to_string()
        } else {
            self.active_vault.clone()
        }
    }

    /// Write `entity` according to the policy. Returns the id it was stored
    /// under, or `None` when skipped.
    fn place<T: Entity>(&mut self, entity: &mut T, set_id: impl FnOnce(&mut T, String)) -> Option<String> {
        if self.txn.contains(T::COLLECTION, entity.id()) {
            match self.policy {
                ConflictPolicy::Skip => return None,
                ConflictPolicy::Overwrite => {}
                ConflictPolicy::Duplicate => set_id(entity, generate_id()),
            }
        }
        self.txn.put(&*entity);
        Some(entity.id().to_string())
    }

    fn scoped<T: VaultScoped>(&mut self, mut entity: T, set_id: impl FnOnce(&mut T, String)) -> bool {
        let vault = self.target_vault(entity.vault_id());
        entity.set_vault_id(vault);
        self.place(&mut entity, set_id).is_some()
    }

    fn run(mut self, data: ExportData) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for mut vault in data.vaults {
            fill_in!(&mut vault);
            let original = vault.id.clone();
            if self.txn.contains(Collection::Vaults, &vault.id) {
                match self.policy {
                    ConflictPolicy::Skip => continue,
                    ConflictPolicy::Overwrite => {}
                    ConflictPolicy::Duplicate => {
                        vault.id = generate_id();
                        vault.name = format!("{} (imported)", vault.name);
                        self.vault_ids.insert(original, vault.id.clone());
                    }
                }
            }
            self.txn.put(&vault);
            self.known_vaults.insert(vault.id);
            summary.vaults += 1;
        }

        // Folder ids are settled before parents and notes are rewritten.
        let mut folders = Vec::new();
        for mut folder in data.folders {
            fill_in!(&mut folder);
            if self.txn.contains(Collection::Folders, &folder.id) {
                match self.policy {
                    ConflictPolicy::Skip => continue,
                    ConflictPolicy::Overwrite => {}
                    ConflictPolicy::Duplicate => {
                        let fresh = generate_id();
                        self.folder_ids.insert(folder.id.clone(), fresh.clone());
                        folder.id = fresh;
                    }
                }
            }
            folders.push(folder);
        }
        for mut folder in folders {
            if let Some(parent) = folder.parent_id.as_ref().and_then(|p| self.folder_ids.get(p)) {
                folder.parent_id = Some(parent.clone());
            }
            folder.vault_id = self.target_vault(&folder.vault_id);
            self.txn.put(&folder);
            summary.folders += 1;
        }

        for mut note in data.notes {
            fill_in!(&mut note);
            if let Some(folder) = note.folder_id.as_ref().and_then(|f| self.folder_ids.get(f)) {
                note.folder_id = Some(folder.clone());
            }
            if self.scoped(note, |n, id| n.id = id) {
                summary.notes += 1;
            }
        }
        for mut person in data.people {
            fill_in!(&mut person);
            if self.scoped(person, |p, id| p.id = id) {
                summary.people += 1;
            }
        }
        for mut event in data.events {
            fill_in!(&mut event);
            if self.scoped(event, |e, id| e.id = id) {
                summary.events += 1;
            }
        }
        for mut template in data.templates {
            fill_in!(&mut template);
            if self.scoped(template, |t, id| t.id = id) {
                summary.templates += 1;
            }
        }

        repair_vault_invariants(self.txn);
        summary
    }
}

/// Keep only entities whose stored value differs.
fn changed<T: Entity + PartialEq>(
    incoming: Vec<T>,
    existing: &std::collections::BTreeMap<String, T>,
) -> Vec<T> {
    incoming
        .into_iter()
        .filter(|entity| existing.get(entity.id()) != Some(entity))
        .collect()
}

impl DocumentStore {
    /// Serialize every collection as a pretty-printed backup file.
    pub fn export_json(&self) -> Result<String> {
        let snapshot = &self.snapshot;
        let data = ExportData {
            version: snapshot.version,
            exported_at: chrono::Utc::now().to_rfc3339(),
            vaults: views::vaults(snapshot),
            folders: snapshot.folders.values().cloned().collect(),
            notes: snapshot.notes.values().cloned().collect(),
            people: snapshot.people.values().cloned().collect(),
            events: snapshot.events.values().cloned().collect(),
            templates: snapshot.templates.values().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Describe what importing `json` would do without changing anything.
    pub fn analyze_import(&self, json: &str) -> Result<ImportAnalysis> {
        let data = parse_import(json)?;
        let mut vault_conflicts = Vec::new();
        let mut new_vaults = Vec::new();

        for imported in data.vaults {
            match self.snapshot.vaults.get(&imported.id) {
                Some(existing) => vault_conflicts.push(VaultConflict {
                    imported_vault: imported,
                    existing_vault: existing.clone(),
                }),
                None => new_vaults.push(imported),
            }
        }

        Ok(ImportAnalysis {
            has_conflicts: !vault_conflicts.is_empty(),
            vault_conflicts,
            new_vaults,
            total_folders: data.folders.len(),
            total_notes: data.notes.len(),
        })
    }

    /// Import a backup file in one transaction.
    ///
    /// Entities without a known vault land in the active vault. A file that
    /// does not parse leaves the document untouched.
    pub fn import_json(&mut self, json: &str, policy: ConflictPolicy) -> Result<ImportSummary> {
        let data = parse_import(json)?;

        let summary = self.mutate(|txn| {
            let known_vaults = txn.all::<Vault>().into_iter().map(|v| v.id).collect();
            let importer = Importer {
                active_vault: active_vault_id(txn),
                txn,
                policy,
                known_vaults,
                vault_ids: HashMap::new(),
                folder_ids: HashMap::new(),
            };
            importer.run(data)
        });

        log::info!("Imported {} entities with policy '{}': {:?}", summary.total(), policy, summary);
        Ok(summary)
    }

    /// Upsert externally produced entities, writing only those that differ
    /// from the stored value. Nothing is published when nothing changed.
    pub fn import_entities(&mut self, batch: ImportBatch) -> ImportSummary {
        let folders = changed(batch.folders, &self.snapshot.folders);
        let notes = changed(batch.notes, &self.snapshot.notes);
        let people = changed(batch.people, &self.snapshot.people);
        let events = changed(batch.events, &self.snapshot.events);

        let summary = ImportSummary {
            folders: folders.len(),
            notes: notes.len(),
            people: people.len(),
            events: events.len(),
            ..Default::default()
        };
        if summary.total() == 0 {
            return summary;
        }

        self.mutate(|txn| {
            folders.iter().for_each(|f| txn.put(f));
            notes.iter().for_each(|n| txn.put(n));
            people.iter().for_each(|p| txn.put(p));
            events.iter().for_each(|e| txn.put(e));
        });
        log::debug!("Imported entity batch: {:?}", summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::crdt::MemoryStorage;
    use crate::model::DEFAULT_VAULT_ID;

    fn store() -> DocumentStore {
        DocumentStore::open(Arc::new(MemoryStorage::new())).unwrap()
    }

    #[test]
    fn test_legacy_note_array_goes_to_active_vault() {
        let mut store = store();
        let work = store.add_vault("Work", None);
        store.set_current_vault(&work.id).unwrap();

        let legacy = json!([
            {"id": "a", "title": "One", "content": "1", "created": 1, "modified": 1},
            {"id": "b", "title": "Two", "content": "2", "created": 2, "modified": 2},
            {"title": "Three", "content": "3"}
        ]);
        let summary = store
            .import_json(&legacy.to_string(), ConflictPolicy::Skip)
            .unwrap();

        assert_eq!(summary.notes, 3);
        assert_eq!(summary.folders, 0);
        assert!(store.notes().iter().all(|n| n.vault_id == work.id));
        let third = store.notes().into_iter().find(|n| n.title == "Three").unwrap();
        assert!(!third.id.is_empty());
        assert!(third.created > 0);
    }

    #[test]
    fn test_invalid_import_leaves_document_untouched() {
        let mut store = store();
        let before = store.snapshot();
        assert!(matches!(
            store.import_json("{not json", ConflictPolicy::Skip),
            Err(KurumiError::InvalidImport(_))
        ));
        assert!(matches!(
            store.import_json(r#"{"hello": 1}"#, ConflictPolicy::Skip),
            Err(KurumiError::InvalidImport(_))
        ));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_export_then_analyze_reports_conflicts() {
        let mut store = store();
        store.add_note("Plan", "body", None).unwrap();
        let export = store.export_json().unwrap();

        let analysis = store.analyze_import(&export).unwrap();
        assert!(analysis.has_conflicts);
        assert_eq!(analysis.vault_conflicts.len(), 1);
        assert!(analysis.new_vaults.is_empty());
        assert_eq!(analysis.total_notes, 1);

        let parsed: Value = serde_json::from_str(&export).unwrap();
        assert!(parsed["exportedAt"].is_string());
        assert_eq!(parsed["templates"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_policy_remaps_vaults_and_folders() {
        let mut source = store();
        let folder = source.add_folder("Inbox", None).unwrap();
        source.add_note("Filed", "", Some(&folder.id)).unwrap();
        let export = source.export_json().unwrap();

        let mut target = store();
        target.import_json(&export, ConflictPolicy::Skip).unwrap();
        let summary = target.import_json(&export, ConflictPolicy::Duplicate).unwrap();
        assert_eq!(summary.vaults, 1);
        assert_eq!(summary.folders, 1);
        assert_eq!(summary.notes, 1);

        let snapshot = target.snapshot();
        let imported = snapshot
            .vaults
            .values()
            .find(|v| v.name == "Default (imported)")
            .unwrap();
        let copy_folder = snapshot
            .folders
            .values()
            .find(|f| f.vault_id == imported.id)
            .unwrap();
        assert_ne!(copy_folder.id, folder.id);
        let copy_note = snapshot
            .notes
            .values()
            .find(|n| n.vault_id == imported.id)
            .unwrap();
        assert_eq!(copy_note.folder_id.as_deref(), Some(copy_folder.id.as_str()));
    }

    #[test]
    fn test_overwrite_and_skip_policies() {
        let mut store = store();
        let note = store.add_note("Plan", "local", None).unwrap();
        let mut incoming = note.clone();
        incoming.content = "imported".into();
        let file = json!([incoming]).to_string();

        let skipped = store.import_json(&file, ConflictPolicy::Skip).unwrap();
        assert_eq!(skipped.notes, 0);
        assert_eq!(store.get_note(&note.id).unwrap().content, "local");

        store.import_json(&file, ConflictPolicy::Overwrite).unwrap();
        assert_eq!(store.get_note(&note.id).unwrap().content, "imported");
    }

    #[test]
    fn test_unknown_vault_falls_back_to_active() {
        let mut store = store();
        let file = json!({
            "vaults": [],
            "notes": [{"id": "n", "title": "Orphan", "vaultId": "ghost", "created": 1, "modified": 1}]
        });
        store.import_json(&file.to_string(), ConflictPolicy::Skip).unwrap();
        assert_eq!(store.get_note("n").unwrap().vault_id, DEFAULT_VAULT_ID);
    }

    #[test]
    fn test_import_entities_writes_only_changes() {
        let mut store = store();
        let note = store.add_note("Plan", "body", None).unwrap();

        let unchanged = store.import_entities(ImportBatch {
            notes: vec![note.clone()],
            ..Default::default()
        });
        assert_eq!(unchanged.total(), 0);

        let mut edited = note.clone();
        edited.content = "changed".into();
        let fresh = Note::new("New", "", None, DEFAULT_VAULT_ID);
        let summary = store.import_entities(ImportBatch {
            notes: vec![edited, fresh.clone()],
            ..Default::default()
        });
        assert_eq!(summary.notes, 2);
        assert_eq!(store.get_note(&note.id).unwrap().content, "changed");
        assert!(store.get_note(&fresh.id).is_some());
    }

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!("Duplicate".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Duplicate);
        assert!("merge".parse::<ConflictPolicy>().is_err());
    }
}
