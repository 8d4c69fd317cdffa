use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Default request body limit: 50 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3030)
    pub port: u16,
    /// Bearer token every request must present
    pub sync_token: String,
    /// Directory holding the stored document (default: ./data)
    pub data_dir: PathBuf,
    /// Largest accepted upload in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid PORT environment variable")]
    InvalidPort,
    #[error("SYNC_TOKEN environment variable is required")]
    MissingToken,
    #[error("Invalid MAX_BODY_BYTES environment variable")]
    InvalidBodyLimit,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("PORT")
            .unwrap_or_else(|| "3030".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let sync_token = var("SYNC_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "./data".to_string()));

        let max_body_bytes = match var("MAX_BODY_BYTES") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidBodyLimit)?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Config {
            host,
            port,
            sync_token,
            data_dir,
            max_body_bytes,
        })
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("SYNC_TOKEN", "s3cret")])).unwrap();
        assert_eq!(config.server_addr(), "0.0.0.0:3030");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_errors() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap_err(), ConfigError::MissingToken);
        assert_eq!(
            Config::from_lookup(lookup(&[("SYNC_TOKEN", "t"), ("PORT", "http")])).unwrap_err(),
            ConfigError::InvalidPort
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("SYNC_TOKEN", "t"), ("MAX_BODY_BYTES", "-1")])).unwrap_err(),
            ConfigError::InvalidBodyLimit
        );
    }
}
