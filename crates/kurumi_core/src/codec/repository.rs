//! Turning a repository file tree back into entities.

use std::collections::{BTreeMap, HashMap};

use super::markdown::{folder_dirs, parse_file};
use super::metadata::{METADATA_DIR, RepoMetadata};
use super::slug::title_from_slug;
use crate::model::{Event, Folder, Note, Person, generate_id, now_millis};

/// Folders recovered from a repository, plus the folder id of every folder path.
#[derive(Debug, Clone, Default)]
pub struct ReconstructedFolders {
    pub folders: Vec<Folder>,
    /// `a/b` → id of the folder at that path.
    pub path_to_folder: HashMap<String, String>,
}

/// Everything parsed from a repository, scoped to one vault.
#[derive(Debug, Clone, Default)]
pub struct RepositoryContents {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
    pub people: Vec<Person>,
    pub events: Vec<Event>,
}

/// True for markdown files outside the side-car directory.
pub fn is_note_path(path: &str) -> bool {
    path.ends_with(".md") && !path.starts_with(&format!("{}/", METADATA_DIR))
}

fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(dir, _)| dir)
}

/// Recover the folder forest.
///
/// With a side-car the folders come from it and their paths are the
/// directories [`folder_dirs`] assigns when writing. Without one, a folder is synthesized for every
/// directory that holds a note, named after the directory; the caller fills in
/// the vault id.
pub fn reconstruct_folders(paths: &[&str], metadata: Option<&RepoMetadata>) -> ReconstructedFolders {
    let now = now_millis();

    if let Some(metadata) = metadata {
        let folders: Vec<Folder> = metadata
            .folders
            .iter()
            .map(|(id, info)| Folder {
                id: id.clone(),
                name: info.name.clone(),
                parent_id: info.parent_id.clone(),
                vault_id: metadata.vault.id.clone(),
                created: info.created.unwrap_or(now),
                modified: info.modified.unwrap_or(now),
            })
            .collect();

        let path_to_folder = folder_dirs(&folders)
            .into_iter()
            .map(|(id, dir)| (dir, id))
            .collect();
        return ReconstructedFolders {
            folders,
            path_to_folder,
        };
    }

    let mut result = ReconstructedFolders::default();
    for path in paths {
        let Some(dir) = parent_path(path) else {
            continue;
        };
        let mut current = String::new();
        let mut parent_id: Option<String> = None;
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            let id = match result.path_to_folder.get(&current) {
                Some(id) => id.clone(),
                None => {
                    let id = generate_id();
                    result.folders.push(Folder {
                        id: id.clone(),
                        name: title_from_slug(segment),
                        parent_id: parent_id.clone(),
                        vault_id: String::new(),
                        created: now,
                        modified: now,
                    });
                    result.path_to_folder.insert(current.clone(), id.clone());
                    id
                }
            };
            parent_id = Some(id);
        }
    }
    result
}

/// Parse a repository snapshot into entities of `vault_id`.
///
/// `files` maps repository paths to file contents; non-note paths are ignored.
pub fn parse_repository(
    files: &BTreeMap<String, String>,
    metadata: Option<&RepoMetadata>,
    vault_id: &str,
) -> RepositoryContents {
    let note_paths: Vec<&str> = files
        .keys()
        .map(String::as_str)
        .filter(|p| is_note_path(p))
        .collect();

    let ReconstructedFolders {
        mut folders,
        path_to_folder,
    } = reconstruct_folders(&note_paths, metadata);
    for folder in &mut folders {
        folder.vault_id = vault_id.to_string();
    }

    let notes = note_paths
        .iter()
        .filter_map(|path| files.get(*path).map(|content| (*path, content)))
        .map(|(path, content)| {
            let parsed = parse_file(path, content);
            let folder_id = parent_path(path).and_then(|dir| path_to_folder.get(dir).cloned());
            let id = metadata
                .and_then(|m| m.note_ids.get(path).cloned())
                .unwrap_or(parsed.id);
            Note {
                id,
                title: parsed.title,
                content: parsed.content,
                tags: parsed.tags,
                folder_id,
                vault_id: vault_id.to_string(),
                created: parsed.created,
                modified: parsed.modified,
            }
        })
        .collect();

    let (people, events) = match metadata {
        Some(metadata) => (
            metadata
                .people
                .values()
                .cloned()
                .map(|mut p| {
                    p.vault_id = vault_id.to_string();
                    p
                })
                .collect(),
            metadata
                .events
                .values()
                .cloned()
                .map(|mut e| {
                    e.vault_id = vault_id.to_string();
                    e
                })
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    RepositoryContents {
        notes,
        folders,
        people,
        events,
    }
}
