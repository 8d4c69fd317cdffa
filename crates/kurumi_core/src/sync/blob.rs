//! Whole-document sync against a blob server.
//!
//! The server keeps a single opaque binary per token: `GET` returns the last
//! stored state (404 when nothing was ever pushed), `PUT` replaces it.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};

use crate::error::{KurumiError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one blob endpoint.
#[derive(Debug, Clone)]
pub struct BlobClient {
    client: Client,
    url: String,
    token: String,
}

fn check_status(status: StatusCode, body: String) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(KurumiError::Auth(format!("blob server rejected the token ({})", status)));
    }
    Err(KurumiError::Http {
        status: status.as_u16(),
        message: body,
    })
}

impl BlobClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url).map_err(|e| KurumiError::InvalidRepoUrl(format!("{}: {}", url, e)))?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            token: token.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the remote binary. `None` means nothing was stored yet.
    pub async fn pull(&self) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            log::debug!("Blob server has no stored state yet");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return check_status(status, body).map(|_| None);
        }

        let bytes = response.bytes().await?;
        log::debug!("Pulled {} bytes from blob server", bytes.len());
        Ok(Some(bytes.to_vec()))
    }

    /// Replace the remote binary.
    pub async fn push(&self, state: Vec<u8>) -> Result<()> {
        let len = state.len();
        let response = self
            .client
            .put(&self.url)
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(state)
            .send()
            .await?;

        let status = response.status();
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        check_status(status, body)?;
        log::debug!("Pushed {} bytes to blob server", len);
        Ok(())
    }

    /// Check that the endpoint is reachable and accepts the token.
    ///
    /// A 404 counts as success: the token was accepted but nothing is stored.
    pub async fn test_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        check_status(status, body)
    }
}
