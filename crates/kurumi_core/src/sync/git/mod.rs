//! Sync through a hosted git repository.
//!
//! A working copy on disk mirrors the active vault as markdown files plus
//! the side-car. Each cycle clones if needed, pulls the tracked branch,
//! merges the files the remote changed since the last sync last-write-wins
//! into the store, writes the merged vault back, then commits and pushes. Git itself is driven through
//! [`GitRunner`].

mod backend;
mod providers;
mod runner;
mod worktree;

pub use backend::{
    DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, DEFAULT_BRANCH, GitBackend, GitSettings, PullOutcome,
    SYNCED_REF,
};
pub use providers::{
    CORS_PROXY, GitProvider, TOKEN_PASSWORD, authenticated_url, clone_url, detect_provider,
    normalize_repo_url, parse_repo_url, redact, validate_repo_url,
};
pub use runner::{GitCli, GitOutput, GitRunner};
pub use worktree::{read_tree, write_tree};
