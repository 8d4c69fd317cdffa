//! Note and folder operations.

use super::{DocumentStore, active_vault_id, views};
use crate::crdt::DocTxn;
use crate::error::{KurumiError, Result};
use crate::model::{Collection, Folder, Note, now_millis};

/// Fields of a note to change; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NoteUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Look up a folder and require it to belong to `vault_id`.
fn folder_in_vault(txn: &DocTxn<'_>, folder_id: &str, vault_id: &str) -> Result<Folder> {
    let folder: Folder = txn
        .get(folder_id)
        .ok_or_else(|| KurumiError::FolderNotFound(folder_id.to_string()))?;
    if folder.vault_id != vault_id {
        return Err(KurumiError::FolderVaultMismatch {
            folder: folder_id.to_string(),
            vault: vault_id.to_string(),
        });
    }
    Ok(folder)
}

fn require_note(txn: &DocTxn<'_>, id: &str) -> Result<Note> {
    txn.get(id)
        .ok_or_else(|| KurumiError::NoteNotFound(id.to_string()))
}

fn require_folder(txn: &DocTxn<'_>, id: &str) -> Result<Folder> {
    txn.get(id)
        .ok_or_else(|| KurumiError::FolderNotFound(id.to_string()))
}

impl DocumentStore {
    // ============ Notes ============

    /// Notes of the active vault, most recently modified first.
    pub fn notes(&self) -> Vec<Note> {
        views::notes_in_vault(&self.snapshot, self.current_vault_id())
    }

    /// Notes of every vault.
    pub fn all_notes(&self) -> Vec<Note> {
        views::all_notes(&self.snapshot)
    }

    pub fn get_note(&self, id: &str) -> Option<Note> {
        self.snapshot.notes.get(id).cloned()
    }

    /// Create a note in the active vault, optionally inside one of its folders.
    pub fn add_note(&mut self, title: &str, content: &str, folder_id: Option<&str>) -> Result<Note> {
        self.try_mutate(|txn| {
            let vault_id = active_vault_id(txn);
            if let Some(folder_id) = folder_id {
                folder_in_vault(txn, folder_id, &vault_id)?;
            }
            let note = Note::new(title, content, folder_id.map(str::to_string), vault_id);
            txn.put(&note);
            Ok(note)
        })
    }

    pub fn update_note(&mut self, id: &str, update: NoteUpdate) -> Result<Note> {
        self.try_mutate(|txn| {
            let mut note = require_note(txn, id)?;
            if let Some(title) = update.title {
                note.title = title;
            }
            if let Some(content) = update.content {
                note.content = content;
            }
            if let Some(tags) = update.tags {
                note.tags = tags;
            }
            note.modified = now_millis();
            txn.put(&note);
            Ok(note)
        })
    }

    pub fn delete_note(&mut self, id: &str) -> Result<()> {
        self.try_mutate(|txn| {
            if !txn.remove::<Note>(id) {
                return Err(KurumiError::NoteNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Move a note into a folder of its own vault, or to the root with `None`.
    pub fn move_note_to_folder(&mut self, note_id: &str, folder_id: Option<&str>) -> Result<Note> {
        self.try_mutate(|txn| {
            let mut note = require_note(txn, note_id)?;
            if let Some(folder_id) = folder_id {
                folder_in_vault(txn, folder_id, &note.vault_id)?;
            }
            note.folder_id = folder_id.map(str::to_string);
            note.modified = now_millis();
            txn.put(&note);
            Ok(note)
        })
    }

    /// Move a note to another vault. The note lands at the vault root.
    pub fn move_note_to_vault(&mut self, note_id: &str, vault_id: &str) -> Result<Note> {
        self.try_mutate(|txn| {
            if !txn.contains(Collection::Vaults, vault_id) {
                return Err(KurumiError::VaultNotFound(vault_id.to_string()));
            }
            let mut note = require_note(txn, note_id)?;
            note.vault_id = vault_id.to_string();
            note.folder_id = None;
            note.modified = now_millis();
            txn.put(&note);
            Ok(note)
        })
    }

    // ============ Folders ============

    /// Folders of the active vault by name.
    pub fn folders(&self) -> Vec<Folder> {
        views::folders_in_vault(&self.snapshot, self.current_vault_id())
    }

    pub fn get_folder(&self, id: &str) -> Option<Folder> {
        self.snapshot.folders.get(id).cloned()
    }

    /// Notes directly inside a folder of the active vault (`None` = root).
    pub fn notes_in_folder(&self, folder_id: Option<&str>) -> Vec<Note> {
        views::notes_in_folder(&self.snapshot, self.current_vault_id(), folder_id)
    }

    /// Folders directly inside a folder of the active vault (`None` = root).
    pub fn subfolders(&self, parent_id: Option<&str>) -> Vec<Folder> {
        views::subfolders(&self.snapshot, self.current_vault_id(), parent_id)
    }

    /// Ancestry of a folder, root first.
    pub fn folder_path(&self, folder_id: &str) -> Vec<Folder> {
        views::folder_path(&self.snapshot.folders, folder_id)
    }

    /// Create a folder in the active vault.
    pub fn add_folder(&mut self, name: &str, parent_id: Option<&str>) -> Result<Folder> {
        self.try_mutate(|txn| {
            let vault_id = active_vault_id(txn);
            if let Some(parent_id) = parent_id {
                folder_in_vault(txn, parent_id, &vault_id)?;
            }
            let folder = Folder::new(name, parent_id.map(str::to_string), vault_id);
            txn.put(&folder);
            Ok(folder)
        })
    }

    pub fn rename_folder(&mut self, id: &str, name: &str) -> Result<Folder> {
        self.try_mutate(|txn| {
            let mut folder = require_folder(txn, id)?;
            folder.name = name.to_string();
            folder.modified = now_millis();
            txn.put(&folder);
            Ok(folder)
        })
    }

    /// Delete a folder.
    ///
    /// With `delete_contents` the whole subtree goes, including every note in
    /// it. Otherwise direct child notes and folders move to the vault root.
    pub fn delete_folder(&mut self, id: &str, delete_contents: bool) -> Result<()> {
        self.try_mutate(|txn| {
            require_folder(txn, id)?;
            let folders = txn.entries::<Folder>();
            let now = now_millis();

            if delete_contents {
                let doomed = views::descendant_folder_ids(&folders, id);
                for note in txn.all::<Note>() {
                    if note.folder_id.as_ref().is_some_and(|f| doomed.contains(f)) {
                        txn.remove::<Note>(&note.id);
                    }
                }
                for folder_id in &doomed {
                    txn.remove::<Folder>(folder_id);
                }
                log::debug!("Deleted folder '{}' with {} folders in its subtree", id, doomed.len());
                return Ok(());
            }

            for mut note in txn.all::<Note>() {
                if note.folder_id.as_deref() == Some(id) {
                    note.folder_id = None;
                    note.modified = now;
                    txn.put(&note);
                }
            }
            for mut child in folders.into_values() {
                if child.parent_id.as_deref() == Some(id) {
                    child.parent_id = None;
                    child.modified = now;
                    txn.put(&child);
                }
            }
            txn.remove::<Folder>(id);
            Ok(())
        })
    }

    /// Reparent a folder within its vault (`None` = root).
    ///
    /// Moving a folder into itself or any of its descendants is rejected.
    pub fn move_folder_to_folder(&mut self, id: &str, parent_id: Option<&str>) -> Result<Folder> {
        self.try_mutate(|txn| {
            let mut folder = require_folder(txn, id)?;
            if let Some(parent_id) = parent_id {
                folder_in_vault(txn, parent_id, &folder.vault_id)?;
                let folders = txn.entries::<Folder>();
                if views::is_in_subtree(&folders, id, parent_id) {
                    return Err(KurumiError::FolderCycle {
                        folder: id.to_string(),
                        target: parent_id.to_string(),
                    });
                }
            }
            folder.parent_id = parent_id.map(str::to_string);
            folder.modified = now_millis();
            txn.put(&folder);
            Ok(folder)
        })
    }

    /// Move a folder, its whole subtree and every note inside it to another
    /// vault. The folder becomes a root folder there.
    pub fn move_folder_to_vault(&mut self, id: &str, vault_id: &str) -> Result<()> {
        self.try_mutate(|txn| {
            if !txn.contains(Collection::Vaults, vault_id) {
                return Err(KurumiError::VaultNotFound(vault_id.to_string()));
            }
            require_folder(txn, id)?;

            let folders = txn.entries::<Folder>();
            let moved = views::descendant_folder_ids(&folders, id);
            let now = now_millis();

            for folder_id in &moved {
                if let Some(mut folder) = folders.get(folder_id).cloned() {
                    folder.vault_id = vault_id.to_string();
                    if folder.id == id {
                        folder.parent_id = None;
                    }
                    folder.modified = now;
                    txn.put(&folder);
                }
            }
            let mut notes_moved = 0;
            for mut note in txn.all::<Note>() {
                if note.folder_id.as_ref().is_some_and(|f| moved.contains(f)) {
                    note.vault_id = vault_id.to_string();
                    note.modified = now;
                    txn.put(&note);
                    notes_moved += 1;
                }
            }
            log::debug!(
                "Moved {} folders and {} notes to vault '{}'",
                moved.len(),
                notes_moved,
                vault_id
            );
            Ok(())
        })
    }
}
