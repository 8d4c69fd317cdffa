use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for kurumi operations
#[derive(Debug, Error)]
pub enum KurumiError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Storage errors
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    // CRDT errors
    #[error("Failed to decode document: {0}")]
    Decode(String),

    #[error("Failed to apply update: {0}")]
    ApplyUpdate(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid import file: {0}")]
    InvalidImport(String),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    // Invariant violations
    #[error("Cannot delete the last remaining vault")]
    LastVault,

    #[error("Vault '{0}' still contains notes or folders")]
    VaultNotEmpty(String),

    #[error("Vault not found: {0}")]
    VaultNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Cannot move folder '{folder}' into its own subtree ('{target}')")]
    FolderCycle { folder: String, target: String },

    #[error("Folder '{folder}' belongs to another vault than '{vault}'")]
    FolderVaultMismatch { folder: String, vault: String },

    // Sync errors
    #[error("Sync is not configured")]
    SyncNotConfigured,

    #[error("Invalid repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },
}

impl From<reqwest::Error> for KurumiError {
    fn from(err: reqwest::Error) -> Self {
        KurumiError::Network(err.to_string())
    }
}

/// Result type alias for kurumi operations
pub type Result<T> = std::result::Result<T, KurumiError>;

/// A serializable representation of KurumiError for IPC consumers
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&KurumiError> for SerializableError {
    fn from(err: &KurumiError) -> Self {
        let kind = match err {
            KurumiError::Io(_) => "Io",
            KurumiError::FileRead { .. } => "FileRead",
            KurumiError::FileWrite { .. } => "FileWrite",
            #[cfg(feature = "sqlite")]
            KurumiError::Database(_) => "Database",
            KurumiError::Storage(_) => "Storage",
            KurumiError::Decode(_) => "Decode",
            KurumiError::ApplyUpdate(_) => "ApplyUpdate",
            KurumiError::Json(_) => "Json",
            KurumiError::InvalidImport(_) => "InvalidImport",
            KurumiError::ConfigParse(_) => "ConfigParse",
            KurumiError::ConfigSerialize(_) => "ConfigSerialize",
            KurumiError::NoConfigDir => "NoConfigDir",
            KurumiError::NoDataDir => "NoDataDir",
            KurumiError::LastVault => "LastVault",
            KurumiError::VaultNotEmpty(_) => "VaultNotEmpty",
            KurumiError::VaultNotFound(_) => "VaultNotFound",
            KurumiError::FolderNotFound(_) => "FolderNotFound",
            KurumiError::NoteNotFound(_) => "NoteNotFound",
            KurumiError::PersonNotFound(_) => "PersonNotFound",
            KurumiError::EventNotFound(_) => "EventNotFound",
            KurumiError::TemplateNotFound(_) => "TemplateNotFound",
            KurumiError::FolderCycle { .. } => "FolderCycle",
            KurumiError::FolderVaultMismatch { .. } => "FolderVaultMismatch",
            KurumiError::SyncNotConfigured => "SyncNotConfigured",
            KurumiError::InvalidRepoUrl(_) => "InvalidRepoUrl",
            KurumiError::Auth(_) => "Auth",
            KurumiError::Http { .. } => "Http",
            KurumiError::Network(_) => "Network",
            KurumiError::Git { .. } => "Git",
        }
        .to_string();

        let path = match err {
            KurumiError::FileRead { path, .. } => Some(path.clone()),
            KurumiError::FileWrite { path, .. } => Some(path.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<KurumiError> for SerializableError {
    fn from(err: KurumiError) -> Self {
        SerializableError::from(&err)
    }
}

impl KurumiError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }

    /// True for errors caused by rejected credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, KurumiError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializable_error_keeps_kind_and_message() {
        let err = KurumiError::VaultNotEmpty("v1".to_string());
        let s = err.to_serializable();
        assert_eq!(s.kind, "VaultNotEmpty");
        assert!(s.message.contains("v1"));
        assert!(s.path.is_none());
    }

    #[test]
    fn file_errors_carry_path() {
        let err = KurumiError::FileWrite {
            path: PathBuf::from("notes/a.md"),
            source: std::io::Error::other("disk full"),
        };
        let s = SerializableError::from(err);
        assert_eq!(s.path, Some(PathBuf::from("notes/a.md")));
    }
}
