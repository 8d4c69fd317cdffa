//! The document store.
//!
//! [`DocumentStore`] owns the single CRDT document of a process. It is an
//! explicit context object: create it with [`DocumentStore::new`], [`load`]
//! it, hand `&mut` access to whoever mutates, and [`teardown`] it when done.
//!
//! Every mutation runs as one document transaction, then the store publishes
//! a fresh [`DocumentSnapshot`] to its subscribers and queues the encoded
//! document on the background [`Persister`]. Reads are answered from the
//! latest snapshot.
//!
//! Validation happens before anything is written: a mutation that returns an
//! error leaves the document exactly as it was.
//!
//! [`load`]: DocumentStore::load
//! [`teardown`]: DocumentStore::teardown

mod notes;
mod references;
mod transfer;
pub mod views;

use std::sync::Arc;

use crate::crdt::{
    CrdtDocument, DOCUMENT_KEY, DocTxn, DocumentStorage, MigrationReport, Persister, migrate,
    repair_vault_invariants,
};
use crate::error::{KurumiError, Result};
use crate::model::{
    Collection, DEFAULT_VAULT_ID, DocumentSnapshot, Folder, Note, Vault, now_millis,
};

pub use notes::NoteUpdate;

pub use transfer::{
    ConflictPolicy, ExportData, ImportAnalysis, ImportBatch, ImportSummary, VaultConflict,
};

/// Handle returned by [`DocumentStore::subscribe`].
pub type SubscriptionId = u64;

type Subscriber = Box<dyn Fn(&Arc<DocumentSnapshot>) + Send + Sync>;

/// How [`DocumentStore::load`] obtained its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was stored; a fresh single-vault document was created.
    Created,
    /// The stored document was decoded and brought up to date.
    Restored(MigrationReport),
    /// The stored document could not be decoded and was replaced.
    Recovered,
}

/// The active vault as seen inside a transaction.
fn active_vault_id(txn: &DocTxn<'_>) -> String {
    txn.current_vault_id()
        .unwrap_or_else(|| DEFAULT_VAULT_ID.to_string())
}

/// A fresh document at the current schema version.
fn fresh_document() -> CrdtDocument {
    let doc = CrdtDocument::new();
    migrate(&doc);
    doc
}

/// Owner of the in-process CRDT document.
pub struct DocumentStore {
    doc: Option<CrdtDocument>,
    storage: Arc<dyn DocumentStorage>,
    key: String,
    persister: Persister,
    snapshot: Arc<DocumentSnapshot>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl DocumentStore {
    /// Create an unloaded store persisting under [`DOCUMENT_KEY`].
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        Self::with_key(storage, DOCUMENT_KEY)
    }

    /// Create an unloaded store persisting under a custom key.
    pub fn with_key(storage: Arc<dyn DocumentStorage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let persister = Persister::spawn(Arc::clone(&storage), key.clone());
        Self {
            doc: None,
            storage,
            key,
            persister,
            snapshot: Arc::new(DocumentSnapshot::default()),
            subscribers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Create a store and load it.
    pub fn open(storage: Arc<dyn DocumentStorage>) -> Result<Self> {
        let mut store = Self::new(storage);
        store.load()?;
        Ok(store)
    }

    /// Restore the persisted document and migrate it to the current schema.
    ///
    /// Only a failure to read from storage is returned; an undecodable state
    /// is logged and replaced with a fresh document.
    pub fn load(&mut self) -> Result<LoadOutcome> {
        let stored = self.storage.load_doc(&self.key)?;

        let (doc, outcome) = match stored {
            None => {
                log::info!("No stored document under '{}', creating one", self.key);
                (fresh_document(), LoadOutcome::Created)
            }
            Some(state) => match CrdtDocument::from_update(&state) {
                Ok(doc) => {
                    let report = migrate(&doc);
                    (doc, LoadOutcome::Restored(report))
                }
                Err(e) => {
                    log::error!("Stored document '{}' is corrupt, starting fresh: {}", self.key, e);
                    (fresh_document(), LoadOutcome::Recovered)
                }
            },
        };

        let repaired = doc.change(repair_vault_invariants);
        let dirty = repaired || !matches!(outcome, LoadOutcome::Restored(r) if !r.migrated());

        self.doc = Some(doc);
        self.refresh_snapshot();
        if dirty {
            self.persist();
        }
        log::debug!("Loaded document '{}': {:?}", self.key, outcome);
        Ok(outcome)
    }

    /// Flush pending writes, drop all subscribers and unload the document.
    pub fn teardown(&mut self) {
        self.persister.flush();
        self.subscribers.clear();
        self.doc = None;
        self.snapshot = Arc::new(DocumentSnapshot::default());
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<DocumentSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Register a callback invoked with every new snapshot.
    pub fn subscribe(
        &mut self,
        callback: impl Fn(&Arc<DocumentSnapshot>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns true if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Apply an infallible change, then publish and persist.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut DocTxn<'_>) -> R) -> R {
        let result = self.document().change(f);
        self.commit();
        result
    }

    /// Apply a change that may be rejected.
    ///
    /// `f` must validate before writing. On `Err` nothing is published or
    /// persisted.
    pub fn try_mutate<R>(&mut self, f: impl FnOnce(&mut DocTxn<'_>) -> Result<R>) -> Result<R> {
        let result = self.document().change(f)?;
        self.commit();
        Ok(result)
    }

    /// Block until every queued write has reached storage.
    pub fn flush(&self) {
        self.persister.flush();
    }

    /// Encode the whole document for sync.
    pub fn save_binary(&mut self) -> Vec<u8> {
        self.document().encode()
    }

    /// The live document, re-initialized if the store was never loaded.
    pub(crate) fn document(&mut self) -> &CrdtDocument {
        if self.doc.is_none() {
            log::error!("Document store '{}' used before load, initializing a fresh document", self.key);
        }
        self.doc.get_or_insert_with(fresh_document)
    }

    /// Swap in a merged document, publish it and wait until it is stored.
    pub(crate) fn replace_document(&mut self, doc: CrdtDocument) {
        self.doc = Some(doc);
        self.commit();
        self.persister.flush();
    }

    fn commit(&mut self) {
        self.refresh_snapshot();
        self.persist();
    }

    fn refresh_snapshot(&mut self) {
        let Some(doc) = &self.doc else {
            return;
        };
        self.snapshot = Arc::new(doc.snapshot());
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.snapshot);
        }
    }

    fn persist(&self) {
        if let Some(doc) = &self.doc {
            self.persister.submit(doc.encode());
        }
    }

    // ============ Vaults ============

    /// All vaults ordered by creation.
    pub fn vaults(&self) -> Vec<Vault> {
        views::vaults(&self.snapshot)
    }

    pub fn get_vault(&self, id: &str) -> Option<Vault> {
        self.snapshot.vaults.get(id).cloned()
    }

    pub fn current_vault_id(&self) -> &str {
        self.snapshot.current_vault_id()
    }

    pub fn current_vault(&self) -> Option<Vault> {
        self.get_vault(self.current_vault_id())
    }

    pub fn set_current_vault(&mut self, id: &str) -> Result<()> {
        self.try_mutate(|txn| {
            if !txn.contains(Collection::Vaults, id) {
                return Err(KurumiError::VaultNotFound(id.to_string()));
            }
            txn.set_current_vault_id(id);
            Ok(())
        })
    }

    /// Create a vault. The active vault is unchanged.
    pub fn add_vault(&mut self, name: &str, icon: Option<String>) -> Vault {
        let vault = Vault::new(name, icon);
        self.mutate(|txn| txn.put(&vault));
        vault
    }

    /// Rename a vault and/or change its icon. `Some(None)` clears the icon.
    pub fn update_vault(
        &mut self,
        id: &str,
        name: Option<&str>,
        icon: Option<Option<String>>,
    ) -> Result<Vault> {
        self.try_mutate(|txn| {
            let mut vault: Vault = txn
                .get(id)
                .ok_or_else(|| KurumiError::VaultNotFound(id.to_string()))?;
            if let Some(name) = name {
                vault.name = name.to_string();
            }
            if let Some(icon) = icon {
                vault.icon = icon;
            }
            vault.modified = now_millis();
            txn.put(&vault);
            Ok(vault)
        })
    }

    /// Delete an empty vault that is not the last one.
    ///
    /// When the active vault is deleted the pointer moves to the oldest
    /// remaining vault.
    pub fn delete_vault(&mut self, id: &str) -> Result<()> {
        self.try_mutate(|txn| {
            let vaults = txn.all::<Vault>();
            if !vaults.iter().any(|v| v.id == id) {
                return Err(KurumiError::VaultNotFound(id.to_string()));
            }
            if vaults.len() <= 1 {
                return Err(KurumiError::LastVault);
            }
            let occupied = txn.all::<Note>().iter().any(|n| n.vault_id == id)
                || txn.all::<Folder>().iter().any(|f| f.vault_id == id);
            if occupied {
                return Err(KurumiError::VaultNotEmpty(id.to_string()));
            }

            let was_current = txn.current_vault_id().as_deref() == Some(id);
            txn.remove::<Vault>(id);
            if was_current
                && let Some(next) = vaults
                    .iter()
                    .filter(|v| v.id != id)
                    .min_by_key(|v| (v.created, v.id.clone()))
            {
                txn.set_current_vault_id(&next.id);
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("key", &self.key)
            .field("loaded", &self.is_loaded())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
