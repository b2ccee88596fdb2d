//! Community invite links.
//!
//! An external invite server hands out a fresh link per registrant via
//! `GET {INVITE_SERVER_URL}/generate`, answering `{ "link": "..." }`. The
//! link is included in the confirmation email.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// HTTP request timeout for one invite request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invite server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Invite server response has no link")]
    MissingLink,
}

#[derive(Debug, Clone)]
pub struct InviteConfig {
    /// Base URL of the invite server, without the `/generate` suffix.
    pub server_url: String,
}

impl InviteConfig {
    /// Returns `None` when `INVITE_SERVER_URL` is unset or empty, in which
    /// case no invite link is fetched.
    pub fn from_env() -> Option<Self> {
        let server_url = std::env::var("INVITE_SERVER_URL").ok()?;
        let server_url = server_url.trim().trim_end_matches('/').to_string();
        if server_url.is_empty() {
            return None;
        }
        Some(Self { server_url })
    }

    pub fn generate_url(&self) -> String {
        format!("{}/generate", self.server_url)
    }
}

/// Supplies invite links for new members.
#[async_trait]
pub trait InviteLinkSource: Send + Sync {
    async fn fetch_link(&self) -> Result<String, InviteError>;
}

#[derive(Debug, Deserialize)]
struct InviteResponse {
    link: Option<String>,
}

pub struct HttpInviteSource {
    config: InviteConfig,
    client: reqwest::Client,
}

impl HttpInviteSource {
    pub fn new(config: InviteConfig) -> Result<Self, InviteError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl InviteLinkSource for HttpInviteSource {
    async fn fetch_link(&self) -> Result<String, InviteError> {
        let response = self.client.get(self.config.generate_url()).send().await?;
        if !response.status().is_success() {
            return Err(InviteError::HttpStatus(response.status().as_u16()));
        }
        let body: InviteResponse = response.json().await?;
        extract_link(body)
    }
}

fn extract_link(body: InviteResponse) -> Result<String, InviteError> {
    body.link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or(InviteError::MissingLink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_url_appends_path() {
        let config = InviteConfig {
            server_url: "http://localhost:6000".to_string(),
        };
        assert_eq!(config.generate_url(), "http://localhost:6000/generate");
    }

    #[test]
    fn link_is_extracted() {
        let body: InviteResponse =
            serde_json::from_str(r#"{"link": " https://chat.example/invite/abc "}"#).unwrap();
        assert_eq!(extract_link(body).unwrap(), "https://chat.example/invite/abc");
    }

    #[test]
    fn empty_or_missing_link_is_an_error() {
        let body: InviteResponse = serde_json::from_str(r#"{"link": ""}"#).unwrap();
        assert!(matches!(extract_link(body), Err(InviteError::MissingLink)));
        let body: InviteResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(matches!(extract_link(body), Err(InviteError::MissingLink)));
    }

    #[test]
    fn http_status_display() {
        assert_eq!(
            InviteError::HttpStatus(503).to_string(),
            "Invite server returned HTTP 503"
        );
    }
}
