//! Hosted git providers and repository URL helpers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KurumiError, Result};

/// Public CORS relay for git smart HTTP from browsers.
pub const CORS_PROXY: &str = "https://cors.isomorphic-git.org";

/// Password sent alongside a token used as the basic-auth user name.
pub const TOKEN_PASSWORD: &str = "x-oauth-basic";

static OWNER_REPO_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://[^/]+/([^/]+)/([^/]+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    GitHub,
    GitLab,
    Codeberg,
}

impl GitProvider {
    pub const ALL: [GitProvider; 3] = [GitProvider::GitHub, GitProvider::GitLab, GitProvider::Codeberg];

    pub fn id(self) -> &'static str {
        match self {
            GitProvider::GitHub => "github",
            GitProvider::GitLab => "gitlab",
            GitProvider::Codeberg => "codeberg",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GitProvider::GitHub => "GitHub",
            GitProvider::GitLab => "GitLab",
            GitProvider::Codeberg => "Codeberg",
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            GitProvider::GitHub => "github.com",
            GitProvider::GitLab => "gitlab.com",
            GitProvider::Codeberg => "codeberg.org",
        }
    }

    /// Where users create an access token.
    pub fn token_url(self) -> &'static str {
        match self {
            GitProvider::GitHub => "https://github.com/settings/tokens/new",
            GitProvider::GitLab => "https://gitlab.com/-/user_settings/personal_access_tokens",
            GitProvider::Codeberg => "https://codeberg.org/user/settings/applications",
        }
    }

    pub fn token_help(self) -> &'static str {
        match self {
            GitProvider::GitHub => "Create a fine-grained token with \"Contents\" read/write access",
            GitProvider::GitLab => "Create a token with \"api\" or \"write_repository\" scope",
            GitProvider::Codeberg => "Create an access token with \"repository\" scope",
        }
    }

    pub fn example_url(self) -> String {
        format!("https://{}/your-username/kurumi-notes", self.host())
    }

    fn repo_pattern(self) -> Regex {
        let pattern = format!(r"^https://{}/[\w-]+/[\w.-]+(?:\.git)?$", regex::escape(self.host()));
        Regex::new(&pattern).expect("valid regex")
    }
}

impl fmt::Display for GitProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GitProvider {
    type Err = KurumiError;

    fn from_str(s: &str) -> Result<Self> {
        GitProvider::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| KurumiError::InvalidRepoUrl(format!("unknown git provider '{}'", s)))
    }
}

/// Guess the provider from the host in a URL.
pub fn detect_provider(url: &str) -> Option<GitProvider> {
    let lower = url.to_lowercase();
    GitProvider::ALL.into_iter().find(|p| lower.contains(p.host()))
}

/// Check an `https://<host>/<owner>/<repo>` URL against a provider.
pub fn validate_repo_url(url: &str, provider: GitProvider) -> bool {
    provider.repo_pattern().is_match(url)
}

/// Trim, default to https when no scheme is given, drop a trailing `.git`
/// and `/`.
pub fn normalize_repo_url(url: &str) -> String {
    let mut normalized = url.trim().to_string();
    if !normalized.contains("://") {
        normalized = format!("https://{}", normalized);
    }
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }
    if let Some(stripped) = normalized.strip_suffix('/') {
        normalized = stripped.to_string();
    }
    normalized
}

/// Credential-free URL to clone from.
pub fn clone_url(url: &str) -> String {
    format!("{}.git", normalize_repo_url(url))
}

/// `(owner, repo)` of a repository URL.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let normalized = normalize_repo_url(url);
    let captures = OWNER_REPO_REGEX.captures(&normalized)?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

/// URL for a single git invocation: credentials embedded, optionally
/// routed through a CORS relay as `<relay>/<host>/<path>`.
pub fn authenticated_url(repo_url: &str, token: &str, cors_proxy: Option<&str>) -> Result<Url> {
    let target = clone_url(repo_url);
    let raw = match cors_proxy {
        Some(proxy) => {
            let without_scheme = target
                .split_once("://")
                .map(|(_, rest)| rest)
                .unwrap_or(&target);
            format!("{}/{}", proxy.trim_end_matches('/'), without_scheme)
        }
        None => target,
    };

    let mut url = Url::parse(&raw).map_err(|e| KurumiError::InvalidRepoUrl(format!("{}: {}", repo_url, e)))?;
    if !token.is_empty() && matches!(url.scheme(), "http" | "https") {
        url.set_username(token)
            .and_then(|_| url.set_password(Some(TOKEN_PASSWORD)))
            .map_err(|_| KurumiError::InvalidRepoUrl(repo_url.to_string()))?;
    }
    Ok(url)
}

/// Remove a secret from text that may be shown to users or logged.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    }
}
