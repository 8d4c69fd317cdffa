//! Schema migrations for stored documents.
//!
//! Each migration runs in its own transaction and bumps the document's
//! `version` in that same transaction, so a document is never observed
//! half-migrated. Migrations only fill in what is missing and can be re-run
//! safely.

use serde_json::{Value, json};

use super::document::{CrdtDocument, DocTxn};
use crate::model::{Collection, DEFAULT_VAULT_ID, Template, Vault};
use crate::template::starter_templates;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 4;

type Migration = fn(&mut DocTxn<'_>);

/// Migrations in version order; entry `i` upgrades version `i` to `i + 1`.
const MIGRATIONS: [(&str, Migration); CURRENT_SCHEMA_VERSION as usize] = [
    ("backfill note folder ids", backfill_folder_ids),
    ("introduce vaults", introduce_vaults),
    ("backfill tags and custom fields", backfill_reference_fields),
    ("seed starter templates", seed_starter_templates),
];

/// Result of [`migrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
}

impl MigrationReport {
    pub fn migrated(&self) -> bool {
        self.from != self.to
    }
}

/// Bring `doc` up to [`CURRENT_SCHEMA_VERSION`].
pub fn migrate(doc: &CrdtDocument) -> MigrationReport {
    let from = doc.change(|txn| txn.version());
    if from > CURRENT_SCHEMA_VERSION {
        log::warn!(
            "Document schema version {} is newer than supported version {}",
            from,
            CURRENT_SCHEMA_VERSION
        );
        return MigrationReport { from, to: from };
    }

    for (index, (name, migration)) in MIGRATIONS.iter().enumerate().skip(from as usize) {
        let target = index as u32 + 1;
        doc.change(|txn| {
            migration(txn);
            txn.set_version(target);
        });
        log::info!("Migrated document to v{} ({})", target, name);
    }

    MigrationReport {
        from,
        to: CURRENT_SCHEMA_VERSION,
    }
}

/// Restore the vault invariants: at least one vault exists and the active
/// pointer references one. Returns true if anything was written.
pub fn repair_vault_invariants(txn: &mut DocTxn<'_>) -> bool {
    let mut vaults = txn.all::<Vault>();
    let mut changed = false;

    if vaults.is_empty() {
        let vault = Vault::default_vault();
        txn.put(&vault);
        vaults.push(vault);
        changed = true;
    }

    let current = txn.current_vault_id();
    let valid = current
        .as_deref()
        .is_some_and(|id| vaults.iter().any(|v| v.id == id));
    if !valid {
        let fallback = vaults
            .iter()
            .find(|v| v.id == DEFAULT_VAULT_ID)
            .or_else(|| vaults.iter().min_by_key(|v| (v.created, v.id.clone())))
            .map(|v| v.id.clone())
            .unwrap_or_else(|| DEFAULT_VAULT_ID.to_string());
        txn.set_current_vault_id(&fallback);
        changed = true;
    }

    changed
}

/// v1: every note carries an explicit `folderId`.
fn backfill_folder_ids(txn: &mut DocTxn<'_>) {
    for (id, mut note) in txn.raw_entries(Collection::Notes) {
        if let Some(object) = note.as_object_mut()
            && !object.contains_key("folderId")
        {
            object.insert("folderId".to_string(), Value::Null);
            txn.put_raw(Collection::Notes, &id, &note);
        }
    }
}

/// v2: vaults exist, the active pointer is set, notes and folders belong to a vault.
fn introduce_vaults(txn: &mut DocTxn<'_>) {
    repair_vault_invariants(txn);

    for collection in [Collection::Notes, Collection::Folders] {
        for (id, mut value) in txn.raw_entries(collection) {
            if let Some(object) = value.as_object_mut() {
                let missing = object
                    .get("vaultId")
                    .and_then(Value::as_str)
                    .is_none_or(str::is_empty);
                if missing {
                    object.insert("vaultId".to_string(), json!(DEFAULT_VAULT_ID));
                    txn.put_raw(collection, &id, &value);
                }
            }
        }
    }
}

/// v3: notes have a tag list; people and events have custom fields.
fn backfill_reference_fields(txn: &mut DocTxn<'_>) {
    let backfills = [
        (Collection::Notes, "tags", json!([])),
        (Collection::People, "customFields", json!({})),
        (Collection::Events, "customFields", json!({})),
    ];
    for (collection, field, default) in backfills {
        for (id, mut value) in txn.raw_entries(collection) {
            if let Some(object) = value.as_object_mut()
                && !object.contains_key(field)
            {
                object.insert(field.to_string(), default.clone());
                txn.put_raw(collection, &id, &value);
            }
        }
    }
}

/// v4: every vault without templates gets the starter set.
fn seed_starter_templates(txn: &mut DocTxn<'_>) {
    let templates = txn.all::<Template>();
    for vault in txn.all::<Vault>() {
        if templates.iter().any(|t| t.vault_id == vault.id) {
            continue;
        }
        for template in starter_templates(&vault.id) {
            txn.put(&template);
        }
    }
}
