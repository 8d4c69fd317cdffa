//! Reading and writing the files of a working copy.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::codec::{METADATA_PATH, MarkdownFile, is_note_path};
use crate::error::{KurumiError, Result};

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn tracked_paths(root: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry in working copy: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = relative_path(root, entry.path())?;
            (is_note_path(&relative) || relative == METADATA_PATH)
                .then(|| (relative, entry.into_path()))
        })
        .collect()
}

/// Markdown files and the side-car, keyed by `/`-separated relative path.
///
/// Files that are not valid UTF-8 are logged and skipped.
pub fn read_tree(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    for (relative, path) in tracked_paths(root) {
        let bytes = fs::read(&path).map_err(|source| KurumiError::FileRead {
            path: path.clone(),
            source,
        })?;
        match String::from_utf8(bytes) {
            Ok(content) => {
                files.insert(relative, content);
            }
            Err(_) => log::warn!("Skipping non UTF-8 file {}", relative),
        }
    }
    log::debug!("Read {} files from {}", files.len(), root.display());
    Ok(files)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| KurumiError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if fs::read_to_string(path).is_ok_and(|existing| existing == content) {
        return Ok(());
    }
    fs::write(path, content).map_err(|source| KurumiError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove now-empty directories between `path` and `root`.
fn prune_empty_parents(root: &Path, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Replace the working copy's notes with `files` and write the side-car.
///
/// Markdown files without a counterpart in `files` are deleted. Unchanged
/// files are not rewritten. Returns the number of removed files.
pub fn write_tree(root: &Path, files: &[MarkdownFile], metadata_json: &str) -> Result<usize> {
    let wanted: BTreeSet<&str> = files.iter().map(|f| f.path.as_str()).collect();

    let mut removed = 0;
    for (relative, path) in tracked_paths(root) {
        if is_note_path(&relative) && !wanted.contains(relative.as_str()) {
            fs::remove_file(&path).map_err(|source| KurumiError::FileWrite {
                path: path.clone(),
                source,
            })?;
            prune_empty_parents(root, &path);
            removed += 1;
        }
    }

    for file in files {
        write_file(&root.join(&file.path), &file.content)?;
    }
    write_file(&root.join(METADATA_PATH), metadata_json)?;

    log::debug!(
        "Wrote {} notes to {} ({} stale files removed)",
        files.len(),
        root.display(),
        removed
    );
    Ok(removed)
}
