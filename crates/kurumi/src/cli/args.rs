//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kurumi_core::store::ConflictPolicy;
use kurumi_core::sync::git::GitProvider;

#[derive(Parser)]
#[command(name = "kurumi")]
#[command(version)]
#[command(about = "Offline-first notes with blob and git sync", long_about = None)]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "KURUMI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override where the note database and git working copy live
    #[arg(long, global = true, env = "KURUMI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Vault management commands
    #[command(alias = "v")]
    Vault {
        #[command(subcommand)]
        command: VaultCommands,
    },

    /// Note management commands
    #[command(alias = "n")]
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },

    /// Folder management commands
    #[command(alias = "f")]
    Folder {
        #[command(subcommand)]
        command: FolderCommands,
    },

    /// Sync the notes with the configured remote
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Show or change configuration (shows it when no subcommand is given)
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },

    /// Write a full JSON backup of every vault
    Export {
        /// Output file ("-" for stdout)
        file: PathBuf,
    },

    /// Restore a JSON backup (full export or a bare array of notes)
    Import {
        /// Backup file to read
        file: PathBuf,

        /// What to do with entities whose id already exists
        #[arg(long, default_value = "skip")]
        on_conflict: ConflictPolicy,

        /// Only report what would be imported
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum VaultCommands {
    /// List vaults, marking the active one
    #[command(alias = "ls")]
    List,

    /// Create a vault
    Add {
        /// Name of the vault
        name: String,

        /// Icon shown next to the name
        #[arg(long)]
        icon: Option<String>,

        /// Make the new vault the active one
        #[arg(short, long)]
        switch: bool,
    },

    /// Rename a vault
    Rename {
        /// Vault id or name
        vault: String,

        /// New name
        name: String,
    },

    /// Delete an empty vault
    #[command(alias = "rm")]
    Remove {
        /// Vault id or name
        vault: String,
    },

    /// Make a vault the active one
    Switch {
        /// Vault id or name
        vault: String,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// List notes of the active vault
    #[command(alias = "ls")]
    List {
        /// Only notes directly inside this folder (id or name)
        #[arg(short, long)]
        folder: Option<String>,

        /// Only notes tagged with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Notes of every vault
        #[arg(short, long)]
        all: bool,
    },

    /// Create a note in the active vault
    #[command(alias = "new")]
    Add {
        /// Title of the note
        title: String,

        /// Body text (markdown)
        #[arg(short, long)]
        content: Option<String>,

        /// Folder to create the note in (id or name)
        #[arg(short, long)]
        folder: Option<String>,

        /// Template to render the body from (id or name)
        #[arg(short, long, conflicts_with = "content")]
        template: Option<String>,
    },

    /// Print a note
    #[command(alias = "cat")]
    Show {
        /// Note id or title
        note: String,
    },

    /// Change a note; opens $EDITOR when no field is given
    Edit {
        /// Note id or title
        note: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New body text
        #[arg(short, long)]
        content: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a note
    #[command(alias = "remove")]
    Rm {
        /// Note id or title
        note: String,
    },

    /// Move a note to another folder or vault
    #[command(alias = "move")]
    Mv {
        /// Note id or title
        note: String,

        /// Target folder (id or name)
        #[arg(short, long, group = "target")]
        folder: Option<String>,

        /// Move to the vault root
        #[arg(long, group = "target")]
        root: bool,

        /// Target vault (id or name); the note lands at its root
        #[arg(long, group = "target")]
        vault: Option<String>,
    },

    /// List the templates of the active vault
    Templates,
}

#[derive(Subcommand)]
pub enum FolderCommands {
    /// Show the folder tree of the active vault
    #[command(alias = "ls")]
    List,

    /// Create a folder
    Add {
        /// Folder name
        name: String,

        /// Parent folder (id or name)
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Rename a folder
    Rename {
        /// Folder id or name
        folder: String,

        /// New name
        name: String,
    },

    /// Delete a folder
    #[command(alias = "remove")]
    Rm {
        /// Folder id or name
        folder: String,

        /// Also delete every subfolder and note inside it; otherwise they
        /// move to the vault root
        #[arg(short, long)]
        recursive: bool,
    },

    /// Move a folder under another folder or into another vault
    #[command(alias = "move")]
    Mv {
        /// Folder id or name
        folder: String,

        /// New parent folder (id or name)
        #[arg(long, group = "target")]
        into: Option<String>,

        /// Make it a root folder
        #[arg(long, group = "target")]
        root: bool,

        /// Target vault (id or name), moving everything inside along
        #[arg(long, group = "target")]
        vault: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one sync cycle
    Run {
        /// Skip the cycle if the last sync is more recent than the
        /// configured minimum interval
        #[arg(long)]
        auto: bool,
    },

    /// Check that the remote is reachable with the configured credentials
    Test,

    /// Show the sync configuration and the outcome of the last cycle
    Status,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,

    /// Sync the whole document with a blob server
    Blob {
        /// Document URL, e.g. https://sync.example.com/sync
        url: String,

        /// Bearer token expected by the server
        #[arg(long, env = "KURUMI_SYNC_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Sync notes as markdown files with a git repository
    Git {
        /// Repository URL, e.g. https://github.com/user/notes
        repo_url: String,

        /// Personal access token with push rights
        #[arg(long, env = "KURUMI_SYNC_TOKEN", hide_env_values = true)]
        token: String,

        /// Hosting provider (github, gitlab, codeberg); detected from the URL
        #[arg(long)]
        provider: Option<GitProvider>,

        /// Branch to sync
        #[arg(long)]
        branch: Option<String>,

        /// Commit author name
        #[arg(long)]
        author_name: Option<String>,

        /// Commit author email
        #[arg(long)]
        author_email: Option<String>,

        /// Relay prefix for git over HTTP
        #[arg(long)]
        cors_proxy: Option<String>,
    },

    /// Set the minimum seconds between automatic syncs
    Interval {
        /// Seconds
        secs: u64,
    },

    /// Remove the sync settings
    Clear,
}
