//! Configuration types for Kurumi.
//!
//! [`Config`] holds the data directory override, the sync debounce interval
//! and the sync backend settings. It is persisted as TOML, typically at
//! `~/.config/kurumi/config.toml` on Unix systems.
//!
//! # Example
//!
//! ```ignore
//! use kurumi_core::config::{Config, SyncConfig};
//!
//! let mut config = Config::load()?;
//! config.sync = Some(SyncConfig::blob("https://sync.example.com/sync", "secret"));
//! config.save()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KurumiError, Result};
use crate::sync::git::{
    DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, DEFAULT_BRANCH, GitBackend, GitProvider, GitSettings,
    detect_provider, normalize_repo_url, validate_repo_url,
};
use crate::sync::{BlobClient, SyncBackend};

/// Default minimum time between automatic syncs.
pub const DEFAULT_MIN_SYNC_INTERVAL_SECS: u64 = 30;

fn default_min_sync_interval() -> u64 {
    DEFAULT_MIN_SYNC_INTERVAL_SECS
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_author_name() -> String {
    DEFAULT_AUTHOR_NAME.to_string()
}

fn default_author_email() -> String {
    DEFAULT_AUTHOR_EMAIL.to_string()
}

/// Remote the document is synced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SyncConfig {
    /// Whole-document sync with a blob server.
    Blob { url: String, token: String },
    /// Markdown sync with a hosted git repository.
    Git {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<GitProvider>,
        repo_url: String,
        #[serde(default = "default_branch")]
        branch: String,
        token: String,
        #[serde(default = "default_author_name")]
        author_name: String,
        #[serde(default = "default_author_email")]
        author_email: String,
        /// Relay prefix for git smart HTTP, e.g. `https://cors.isomorphic-git.org`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cors_proxy: Option<String>,
    },
}

impl SyncConfig {
    pub fn blob(url: impl Into<String>, token: impl Into<String>) -> Self {
        SyncConfig::Blob {
            url: url.into(),
            token: token.into(),
        }
    }

    /// Git settings with defaults. The URL is normalized and the provider
    /// detected from it.
    pub fn git(repo_url: &str, token: impl Into<String>) -> Self {
        let repo_url = normalize_repo_url(repo_url);
        SyncConfig::Git {
            provider: detect_provider(&repo_url),
            repo_url,
            branch: default_branch(),
            token: token.into(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            cors_proxy: None,
        }
    }

    /// Reject a repository URL that does not fit its declared provider.
    pub fn validate(&self) -> Result<()> {
        match self {
            SyncConfig::Blob { url, .. } => {
                url::Url::parse(url)
                    .map_err(|e| KurumiError::InvalidRepoUrl(format!("{}: {}", url, e)))?;
                Ok(())
            }
            SyncConfig::Git {
                provider, repo_url, ..
            } => {
                if let Some(provider) = provider
                    && !validate_repo_url(repo_url, *provider)
                {
                    return Err(KurumiError::InvalidRepoUrl(format!(
                        "{} is not a {} repository URL (expected e.g. {})",
                        repo_url,
                        provider,
                        provider.example_url()
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncConfig::Blob { .. } => "blob",
            SyncConfig::Git { .. } => "git",
        }
    }
}

/// `Config` is the part of Kurumi that the user can configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where the document database and git working copy live. Defaults to
    /// the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Minimum seconds between automatic syncs
    #[serde(default = "default_min_sync_interval")]
    pub min_sync_interval_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            min_sync_interval_secs: DEFAULT_MIN_SYNC_INTERVAL_SECS,
            sync: None,
        }
    }
}

impl Config {
    /// Get the config file path (~/.config/kurumi/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kurumi").join("config.toml"))
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| KurumiError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| KurumiError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from default location, or return default if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Config::default())
    }

    /// Save config to default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(KurumiError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join("kurumi"))
                .ok_or(KurumiError::NoDataDir),
        }
    }

    /// SQLite database holding the document.
    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("kurumi.db"))
    }

    /// Working copy used by git sync.
    pub fn repo_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("repo"))
    }

    pub fn min_sync_interval(&self) -> Duration {
        Duration::from_secs(self.min_sync_interval_secs)
    }

    /// Build the configured sync backend.
    pub fn sync_backend(&self) -> Result<SyncBackend> {
        let sync = self.sync.as_ref().ok_or(KurumiError::SyncNotConfigured)?;
        sync.validate()?;
        match sync {
            SyncConfig::Blob { url, token } => Ok(SyncBackend::Blob(BlobClient::new(url, token)?)),
            SyncConfig::Git {
                repo_url,
                branch,
                token,
                author_name,
                author_email,
                cors_proxy,
                ..
            } => {
                let settings = GitSettings {
                    repo_url: repo_url.clone(),
                    branch: branch.clone(),
                    token: token.clone(),
                    author_name: author_name.clone(),
                    author_email: author_email.clone(),
                    cors_proxy: cors_proxy.clone(),
                };
                Ok(SyncBackend::Git(GitBackend::with_cli(settings, self.repo_dir()?)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_get_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.min_sync_interval(), Duration::from_secs(30));

        let config: Config = toml::from_str(
            r#"
            [sync]
            backend = "git"
            repo_url = "https://github.com/ada/notes"
            token = "t"
            "#,
        )
        .unwrap();
        match config.sync.unwrap() {
            SyncConfig::Git {
                branch,
                author_name,
                author_email,
                provider,
                ..
            } => {
                assert_eq!(branch, "main");
                assert_eq!(author_name, "Kurumi");
                assert_eq!(author_email, "kurumi@localhost");
                assert_eq!(provider, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            min_sync_interval_secs: 5,
            sync: Some(SyncConfig::git("github.com/ada/notes.git", "t")),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.database_path().unwrap(), dir.path().join("kurumi.db"));
        assert_eq!(loaded.repo_dir().unwrap(), dir.path().join("repo"));
        match loaded.sync.unwrap() {
            SyncConfig::Git {
                repo_url, provider, ..
            } => {
                assert_eq!(repo_url, "https://github.com/ada/notes");
                assert_eq!(provider, Some(GitProvider::GitHub));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sync_backend() {
        assert!(matches!(
            Config::default().sync_backend(),
            Err(KurumiError::SyncNotConfigured)
        ));

        let mut config = Config {
            data_dir: Some(PathBuf::from("/tmp/kurumi-test")),
            ..Default::default()
        };
        config.sync = Some(SyncConfig::blob("http://localhost:3030/sync", "t"));
        assert_eq!(config.sync_backend().unwrap().kind(), "blob");

        config.sync = Some(SyncConfig::Git {
            provider: Some(GitProvider::GitLab),
            repo_url: "https://github.com/ada/notes".into(),
            branch: "main".into(),
            token: "t".into(),
            author_name: "A".into(),
            author_email: "a@b".into(),
            cors_proxy: None,
        });
        assert!(matches!(config.sync_backend(), Err(KurumiError::InvalidRepoUrl(_))));
    }
}
