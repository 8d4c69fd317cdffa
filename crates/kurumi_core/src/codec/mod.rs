//! Markdown and side-car representation of a vault.
//!
//! The git backend stores one vault as a tree of markdown files, one per note,
//! laid out by folder, plus a JSON side-car (`.kurumi/metadata.json`) with the
//! ids and entities the file tree cannot express.

pub mod frontmatter;
mod markdown;
mod metadata;
mod repository;
mod slug;

pub use markdown::{
    MarkdownFile, ParsedNote, folder_dirs, note_paths, note_to_markdown, notes_to_files,
    parse_file,
};
pub use metadata::{
    FolderInfo, METADATA_DIR, METADATA_PATH, METADATA_VERSION, RepoMetadata, VaultInfo,
};
pub use repository::{
    ReconstructedFolders, RepositoryContents, is_note_path, parse_repository, reconstruct_folders,
};
pub use slug::{UNTITLED_SLUG, slugify, title_from_slug};
