//! The Kurumi CRDT document.
//!
//! [`CrdtDocument`] wraps a yrs [`Doc`] and exposes the handful of
//! capabilities the rest of the crate needs: encode to and decode from the
//! binary update format, apply a remote update, fork, run a transactional
//! change, and project the contents into a plain [`DocumentSnapshot`].
//!
//! Each collection is a root Y.Map keyed by entity id whose values are the
//! entity's JSON. Concurrent writes to the same key converge on one value
//! chosen by the CRDT, independent of the entities' `modified` timestamps.

use std::collections::BTreeMap;

use serde_json::Value;
use yrs::updates::decoder::Decode;
use yrs::{Doc, Map, MapRef, ReadTxn, StateVector, Transact, TransactionMut, Update};

use crate::error::{KurumiError, Result};
use crate::model::{Collection, DocumentSnapshot, Entity};

/// The name of the Y.Map holding document-level fields.
const META_MAP_NAME: &str = "meta";

const CURRENT_VAULT_KEY: &str = "currentVaultId";
const VERSION_KEY: &str = "version";

struct Maps {
    vaults: MapRef,
    folders: MapRef,
    notes: MapRef,
    people: MapRef,
    events: MapRef,
    templates: MapRef,
    meta: MapRef,
}

impl Maps {
    fn new(doc: &Doc) -> Self {
        Self {
            vaults: doc.get_or_insert_map(Collection::Vaults.map_name()),
            folders: doc.get_or_insert_map(Collection::Folders.map_name()),
            notes: doc.get_or_insert_map(Collection::Notes.map_name()),
            people: doc.get_or_insert_map(Collection::People.map_name()),
            events: doc.get_or_insert_map(Collection::Events.map_name()),
            templates: doc.get_or_insert_map(Collection::Templates.map_name()),
            meta: doc.get_or_insert_map(META_MAP_NAME),
        }
    }

    fn collection(&self, collection: Collection) -> &MapRef {
        match collection {
            Collection::Vaults => &self.vaults,
            Collection::Folders => &self.folders,
            Collection::Notes => &self.notes,
            Collection::People => &self.people,
            Collection::Events => &self.events,
            Collection::Templates => &self.templates,
        }
    }
}

/// A CRDT document holding every Kurumi collection.
pub struct CrdtDocument {
    doc: Doc,
    maps: Maps,
}

impl Default for CrdtDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl CrdtDocument {
    /// Create a new document with empty collections and no meta fields.
    pub fn new() -> Self {
        let doc = Doc::new();
        let maps = Maps::new(&doc);
        Self { doc, maps }
    }

    /// Decode a document from a full-state binary update.
    pub fn from_update(state: &[u8]) -> Result<Self> {
        let document = Self::new();
        document.apply_update(state)?;
        Ok(document)
    }

    /// Encode the full document state as a binary update.
    pub fn encode(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Apply a binary update produced by [`encode`](Self::encode) on any replica.
    pub fn apply_update(&self, update: &[u8]) -> Result<()> {
        let decoded =
            Update::decode_v1(update).map_err(|e| KurumiError::Decode(e.to_string()))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(decoded)
            .map_err(|e| KurumiError::ApplyUpdate(e.to_string()))
    }

    /// Integrate every change of `other` into this document.
    pub fn merge_from(&self, other: &CrdtDocument) -> Result<()> {
        self.apply_update(&other.encode())
    }

    /// Create an independent replica with the same state.
    pub fn fork(&self) -> Result<Self> {
        Self::from_update(&self.encode())
    }

    /// Run `f` inside one atomic transaction.
    pub fn change<R>(&self, f: impl FnOnce(&mut DocTxn<'_>) -> R) -> R {
        let mut txn = DocTxn {
            txn: self.doc.transact_mut(),
            maps: &self.maps,
        };
        f(&mut txn)
    }

    /// Number of entries in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        let txn = self.doc.transact();
        self.maps.collection(collection).len(&txn) as usize
    }

    /// Read and decode one entity.
    pub fn get<T: Entity>(&self, id: &str) -> Option<T> {
        let txn = self.doc.transact();
        read_entity(&txn, self.maps.collection(T::COLLECTION), id)
    }

    /// Read and decode every entity of a collection, skipping malformed values.
    pub fn all<T: Entity>(&self) -> Vec<T> {
        let txn = self.doc.transact();
        read_collection(&txn, self.maps.collection(T::COLLECTION))
            .into_values()
            .collect()
    }

    /// Project the document into plain values.
    pub fn snapshot(&self) -> DocumentSnapshot {
        let txn = self.doc.transact();
        DocumentSnapshot {
            vaults: read_collection(&txn, &self.maps.vaults),
            folders: read_collection(&txn, &self.maps.folders),
            notes: read_collection(&txn, &self.maps.notes),
            people: read_collection(&txn, &self.maps.people),
            events: read_collection(&txn, &self.maps.events),
            templates: read_collection(&txn, &self.maps.templates),
            current_vault_id: read_meta(&txn, &self.maps.meta, CURRENT_VAULT_KEY).unwrap_or_default(),
            version: read_version(&txn, &self.maps.meta),
        }
    }
}

impl std::fmt::Debug for CrdtDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrdtDocument")
            .field("notes", &self.len(Collection::Notes))
            .field("folders", &self.len(Collection::Folders))
            .field("vaults", &self.len(Collection::Vaults))
            .finish()
    }
}

fn read_entity<T: Entity, R: ReadTxn>(txn: &R, map: &MapRef, id: &str) -> Option<T> {
    map.get(txn, id).and_then(|value| {
        let json = value.to_string(txn);
        serde_json::from_str(&json).ok()
    })
}

fn read_collection<T: Entity, R: ReadTxn>(txn: &R, map: &MapRef) -> BTreeMap<String, T> {
    map.iter(txn)
        .filter_map(|(key, value)| {
            let json = value.to_string(txn);
            match serde_json::from_str::<T>(&json) {
                Ok(entity) => Some((key.to_string(), entity)),
                Err(e) => {
                    log::warn!("Skipping malformed {:?} entry '{}': {}", T::COLLECTION, key, e);
                    None
                }
            }
        })
        .collect()
}

fn read_meta<R: ReadTxn>(txn: &R, meta: &MapRef, key: &str) -> Option<String> {
    meta.get(txn, key)
        .map(|value| value.to_string(txn))
        .filter(|value| !value.is_empty())
}

fn read_version<R: ReadTxn>(txn: &R, meta: &MapRef) -> u32 {
    read_meta(txn, meta, VERSION_KEY)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// An open read-write transaction on a [`CrdtDocument`].
///
/// Dropping the value commits every change made through it as one update.
pub struct DocTxn<'doc> {
    txn: TransactionMut<'doc>,
    maps: &'doc Maps,
}

impl DocTxn<'_> {
    pub fn get<T: Entity>(&self, id: &str) -> Option<T> {
        read_entity(&self.txn, self.maps.collection(T::COLLECTION), id)
    }

    pub fn all<T: Entity>(&self) -> Vec<T> {
        self.entries().into_values().collect()
    }

    /// Every entity of a collection keyed by id.
    pub fn entries<T: Entity>(&self) -> BTreeMap<String, T> {
        read_collection(&self.txn, self.maps.collection(T::COLLECTION))
    }

    pub fn contains(&self, collection: Collection, id: &str) -> bool {
        self.maps.collection(collection).contains_key(&self.txn, id)
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.maps.collection(collection).len(&self.txn) as usize
    }

    /// Insert or replace an entity under its id.
    pub fn put<T: Entity>(&mut self, entity: &T) {
        match serde_json::to_string(entity) {
            Ok(json) => {
                self.maps
                    .collection(T::COLLECTION)
                    .insert(&mut self.txn, entity.id().to_string(), json);
            }
            Err(e) => log::error!("Failed to encode {:?} '{}': {}", T::COLLECTION, entity.id(), e),
        }
    }

    /// Remove an entity. Returns true if it existed.
    pub fn remove<T: Entity>(&mut self, id: &str) -> bool {
        self.maps
            .collection(T::COLLECTION)
            .remove(&mut self.txn, id)
            .is_some()
    }

    /// Every entry of a collection as untyped JSON, for migrations.
    pub fn raw_entries(&self, collection: Collection) -> Vec<(String, Value)> {
        self.maps
            .collection(collection)
            .iter(&self.txn)
            .filter_map(|(key, value)| {
                let json = value.to_string(&self.txn);
                serde_json::from_str(&json).ok().map(|v| (key.to_string(), v))
            })
            .collect()
    }

    /// Write an untyped JSON entry.
    pub fn put_raw(&mut self, collection: Collection, id: &str, value: &Value) {
        self.maps
            .collection(collection)
            .insert(&mut self.txn, id.to_string(), value.to_string());
    }

    pub fn current_vault_id(&self) -> Option<String> {
        read_meta(&self.txn, &self.maps.meta, CURRENT_VAULT_KEY)
    }

    pub fn set_current_vault_id(&mut self, vault_id: &str) {
        self.maps
            .meta
            .insert(&mut self.txn, CURRENT_VAULT_KEY, vault_id.to_string());
    }

    pub fn version(&self) -> u32 {
        read_version(&self.txn, &self.maps.meta)
    }

    pub fn set_version(&mut self, version: u32) {
        self.maps
            .meta
            .insert(&mut self.txn, VERSION_KEY, version.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Folder, Note, Vault};

    fn note(id: &str, modified: i64, content: &str) -> Note {
        let mut note = Note::new("Title", content, None, "v1");
        note.id = id.to_string();
        note.modified = modified;
        note
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = CrdtDocument::new();
        let snapshot = doc.snapshot();
        assert!(snapshot.notes.is_empty());
        assert!(snapshot.vaults.is_empty());
        assert_eq!(snapshot.version, 0);
    }

    #[test]
    fn test_put_and_get() {
        let doc = CrdtDocument::new();
        doc.change(|txn| txn.put(&note("n1", 10, "body")));

        let stored: Note = doc.get("n1").unwrap();
        assert_eq!(stored.content, "body");
        assert_eq!(doc.len(Collection::Notes), 1);
        assert!(doc.get::<Note>("missing").is_none());
    }

    #[test]
    fn test_remove() {
        let doc = CrdtDocument::new();
        doc.change(|txn| txn.put(&note("n1", 10, "body")));
        let removed = doc.change(|txn| txn.remove::<Note>("n1"));
        assert!(removed);
        assert_eq!(doc.len(Collection::Notes), 0);
    }

    #[test]
    fn test_meta_fields() {
        let doc = CrdtDocument::new();
        doc.change(|txn| {
            txn.set_current_vault_id("v1");
            txn.set_version(3);
        });
        let snapshot = doc.snapshot();
        assert_eq!(snapshot.current_vault_id, "v1");
        assert_eq!(snapshot.version, 3);
    }

    #[test]
    fn test_encode_and_decode_round_trip() {
        let doc = CrdtDocument::new();
        doc.change(|txn| {
            txn.put(&note("n1", 10, "body"));
            txn.put(&Folder::new("Inbox", None, "v1"));
            txn.put(&Vault::default_vault());
        });

        let decoded = CrdtDocument::from_update(&doc.encode()).unwrap();
        assert_eq!(decoded.snapshot(), doc.snapshot());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = CrdtDocument::from_update(&[0xff, 0xff, 0xff, 0x01, 0x02]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fork_is_independent() {
        let doc = CrdtDocument::new();
        doc.change(|txn| txn.put(&note("n1", 10, "body")));
        let fork = doc.fork().unwrap();
        fork.change(|txn| txn.put(&note("n2", 20, "other")));

        assert_eq!(doc.len(Collection::Notes), 1);
        assert_eq!(fork.len(Collection::Notes), 2);
    }

    #[test]
    fn test_concurrent_edits_merge() {
        let a = CrdtDocument::new();
        let b = CrdtDocument::new();
        a.change(|txn| txn.put(&note("n1", 10, "from a")));
        b.change(|txn| txn.put(&note("n2", 20, "from b")));

        a.merge_from(&b).unwrap();
        b.merge_from(&a).unwrap();

        assert_eq!(a.len(Collection::Notes), 2);
        assert_eq!(a.snapshot().notes, b.snapshot().notes);
    }

    #[test]
    fn test_raw_entries_round_trip() {
        let doc = CrdtDocument::new();
        doc.change(|txn| {
            txn.put_raw(
                Collection::Notes,
                "legacy",
                &serde_json::json!({"id": "legacy", "title": "Old", "content": "x"}),
            )
        });
        let entries = doc.change(|txn| txn.raw_entries(Collection::Notes));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1["title"], "Old");
    }
}
