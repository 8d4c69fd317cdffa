//! Reconciling a remote document into the local one.
//!
//! The CRDT's own merge converges, but for concurrent writes to the same
//! entity it picks a winner by replica order rather than by `modified`, and a
//! remote produced by an unrelated replica can shadow local entries. The
//! [`GuardedMerge`] strategy therefore runs the native merge, checks the
//! result for lost or stale data and, when it finds any, re-applies the newest
//! version of every entity on top of the native result.

mod lww;

use std::fmt;

pub use lww::lww_merge;

use crate::crdt::{CrdtDocument, migrate, repair_vault_invariants};
use crate::error::Result;
use crate::model::{Collection, DocumentSnapshot, Entity};
use crate::store::DocumentStore;

/// Remote states shorter than this are treated as corrupt.
pub const MIN_REMOTE_BYTES: usize = 16;

// ============================================================================
// Strategies
// ============================================================================

/// A way of combining two replicas into one document.
pub trait MergeStrategy {
    /// Short name used in logs and [`MergeOutcome::Merged`].
    fn name(&self) -> &'static str;

    /// Produce a new document containing both sides. Neither input is changed.
    fn reconcile(&self, local: &CrdtDocument, remote: &CrdtDocument) -> Result<CrdtDocument>;
}

/// Plain CRDT update application.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeMerge;

impl MergeStrategy for NativeMerge {
    fn name(&self) -> &'static str {
        "native"
    }

    fn reconcile(&self, local: &CrdtDocument, remote: &CrdtDocument) -> Result<CrdtDocument> {
        let merged = local.fork()?;
        merged.merge_from(remote)?;
        Ok(merged)
    }
}

/// Per-entity last-writer-wins over plain values, seeded from the local side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualMerge;

impl MergeStrategy for ManualMerge {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn reconcile(&self, local: &CrdtDocument, remote: &CrdtDocument) -> Result<CrdtDocument> {
        Ok(reconcile_onto(local.fork()?, &local.snapshot(), &remote.snapshot()))
    }
}

/// Native merge with loss detection and a manual pass on top when needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardedMerge;

impl MergeStrategy for GuardedMerge {
    fn name(&self) -> &'static str {
        "guarded"
    }

    fn reconcile(&self, local: &CrdtDocument, remote: &CrdtDocument) -> Result<CrdtDocument> {
        let local_snapshot = local.snapshot();
        let remote_snapshot = remote.snapshot();

        let merged = match NativeMerge.reconcile(local, remote) {
            Ok(merged) => merged,
            Err(e) => {
                log::warn!("Native merge failed, reconciling manually: {}", e);
                return Ok(reconcile_onto(local.fork()?, &local_snapshot, &remote_snapshot));
            }
        };

        match detect_loss(&local_snapshot, &remote_snapshot, &merged.snapshot()) {
            None => Ok(merged),
            Some(loss) => {
                log::warn!("Native merge lost data ({}), reconciling manually", loss);
                Ok(reconcile_onto(merged, &local_snapshot, &remote_snapshot))
            }
        }
    }
}

// ============================================================================
// Loss detection
// ============================================================================

/// Evidence that a merge result dropped data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLoss {
    /// Fewer notes than the larger input.
    NoteCount { merged: usize, expected: usize },
    /// An entity present on both sides kept its older version.
    StaleEntity { collection: Collection, id: String },
}

impl fmt::Display for DataLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLoss::NoteCount { merged, expected } => {
                write!(f, "{} notes after merge, expected at least {}", merged, expected)
            }
            DataLoss::StaleEntity { collection, id } => {
                write!(f, "{:?} '{}' kept an older version", collection, id)
            }
        }
    }
}

fn find_stale<T: Entity>(
    collection: Collection,
    local: &std::collections::BTreeMap<String, T>,
    remote: &std::collections::BTreeMap<String, T>,
    merged: &std::collections::BTreeMap<String, T>,
) -> Option<DataLoss> {
    local.iter().find_map(|(id, ours)| {
        let theirs = remote.get(id)?;
        let result = merged.get(id)?;
        let newest = ours.modified().max(theirs.modified());
        (result.modified() < newest).then(|| DataLoss::StaleEntity {
            collection,
            id: id.clone(),
        })
    })
}

/// Check a merge result against its inputs.
pub fn detect_loss(
    local: &DocumentSnapshot,
    remote: &DocumentSnapshot,
    merged: &DocumentSnapshot,
) -> Option<DataLoss> {
    let expected = local.note_count().max(remote.note_count());
    if merged.note_count() < expected {
        return Some(DataLoss::NoteCount {
            merged: merged.note_count(),
            expected,
        });
    }
    find_stale(Collection::Notes, &local.notes, &remote.notes, &merged.notes)
        .or_else(|| find_stale(Collection::Folders, &local.folders, &remote.folders, &merged.folders))
}

// ============================================================================
// Manual reconciliation
// ============================================================================

/// Winner per id across both sides: larger `modified` wins, ties keep local.
fn newest<'a, T: Entity>(
    local: &'a std::collections::BTreeMap<String, T>,
    remote: &'a std::collections::BTreeMap<String, T>,
) -> Vec<&'a T> {
    let mut winners: std::collections::BTreeMap<&str, &T> =
        local.iter().map(|(id, e)| (id.as_str(), e)).collect();
    for (id, theirs) in remote {
        match winners.get(id.as_str()) {
            Some(ours) if ours.modified() >= theirs.modified() => {}
            _ => {
                winners.insert(id.as_str(), theirs);
            }
        }
    }
    winners.into_values().collect()
}

/// Write the newest version of every entity of both sides into `base`.
///
/// Notes, folders and templates overwrite whatever `base` holds. Vaults,
/// people and events are only added when `base` lacks the id.
pub fn reconcile_onto(
    base: CrdtDocument,
    local: &DocumentSnapshot,
    remote: &DocumentSnapshot,
) -> CrdtDocument {
    let existing = base.snapshot();
    base.change(|txn| {
        for note in newest(&local.notes, &remote.notes) {
            if existing.notes.get(&note.id) != Some(note) {
                txn.put(note);
            }
        }
        for folder in newest(&local.folders, &remote.folders) {
            if existing.folders.get(&folder.id) != Some(folder) {
                txn.put(folder);
            }
        }
        for template in newest(&local.templates, &remote.templates) {
            if existing.templates.get(&template.id) != Some(template) {
                txn.put(template);
            }
        }
        for vault in newest(&local.vaults, &remote.vaults) {
            if !existing.vaults.contains_key(&vault.id) {
                txn.put(vault);
            }
        }
        for person in newest(&local.people, &remote.people) {
            if !existing.people.contains_key(&person.id) {
                txn.put(person);
            }
        }
        for event in newest(&local.events, &remote.events) {
            if !existing.events.contains_key(&event.id) {
                txn.put(event);
            }
        }
    });
    base
}

// ============================================================================
// Store integration
// ============================================================================

/// What [`DocumentStore::merge_remote`] did with a remote state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The payload was too small to be a document.
    Rejected { len: usize },
    /// The payload did not decode.
    DecodeFailed,
    /// Local held no content, so the remote document replaced it.
    AdoptedRemote { notes: usize },
    /// The remote held no content; nothing changed.
    KeptLocal,
    /// Both sides were combined.
    Merged { strategy: &'static str, notes: usize },
}

impl MergeOutcome {
    /// True if the local document may have changed.
    pub fn changed_local(&self) -> bool {
        matches!(self, MergeOutcome::AdoptedRemote { .. } | MergeOutcome::Merged { .. })
    }
}

impl DocumentStore {
    /// Merge a remote binary state into the local document with [`GuardedMerge`].
    pub fn merge_remote(&mut self, remote: &[u8]) -> MergeOutcome {
        self.merge_remote_with(remote, &GuardedMerge)
    }

    /// Merge a remote binary state with a specific strategy.
    ///
    /// Problems with the remote are logged and leave the local document
    /// unchanged. A changed document is published and stored before this
    /// returns.
    pub fn merge_remote_with(&mut self, remote: &[u8], strategy: &dyn MergeStrategy) -> MergeOutcome {
        let outcome = self.merge_inner(remote, strategy);
        match &outcome {
            MergeOutcome::Rejected { .. } | MergeOutcome::DecodeFailed => {
                log::warn!("Remote state not merged: {:?}", outcome)
            }
            _ => log::info!("Merged remote state: {:?}", outcome),
        }
        outcome
    }

    fn merge_inner(&mut self, remote: &[u8], strategy: &dyn MergeStrategy) -> MergeOutcome {
        if remote.len() < MIN_REMOTE_BYTES {
            return MergeOutcome::Rejected { len: remote.len() };
        }
        let remote_doc = match CrdtDocument::from_update(remote) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Failed to decode remote state: {}", e);
                return MergeOutcome::DecodeFailed;
            }
        };

        let local = self.document();
        let local_empty = local.snapshot().is_content_empty();
        let remote_empty = remote_doc.snapshot().is_content_empty();

        if local_empty && !remote_empty {
            migrate(&remote_doc);
            remote_doc.change(repair_vault_invariants);
            let notes = remote_doc.len(Collection::Notes);
            self.replace_document(remote_doc);
            return MergeOutcome::AdoptedRemote { notes };
        }
        if remote_empty && !local_empty {
            return MergeOutcome::KeptLocal;
        }

        match strategy.reconcile(local, &remote_doc) {
            Ok(merged) => {
                migrate(&merged);
                merged.change(repair_vault_invariants);
                let notes = merged.len(Collection::Notes);
                self.replace_document(merged);
                MergeOutcome::Merged {
                    strategy: strategy.name(),
                    notes,
                }
            }
            Err(e) => {
                log::error!("{} merge failed, keeping local state: {}", strategy.name(), e);
                MergeOutcome::KeptLocal
            }
        }
    }
}
