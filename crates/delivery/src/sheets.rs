//! Google Sheets row appender.
//!
//! Authenticates as a service account: a short-lived RS256 JWT assertion is
//! exchanged for an OAuth access token, which is cached until shortly
//! before it expires. Rows are written with `values:append` so the sheet
//! grows below its last populated row.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use ace_core::registration::{format_flag, join_interests};
use ace_db::models::registration::Registration;
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// OAuth scope granting read/write access to spreadsheets.
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Default token endpoint when the key file does not name one.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Grant type for the JWT-bearer OAuth flow.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each JWT assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the cached token this long before Google says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// HTTP request timeout for token and append calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for spreadsheet updates.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// The service-account key could not be read or parsed.
    #[error("Service account credentials error: {0}")]
    Credentials(String),

    /// A URL or other setting is unusable.
    #[error("Sheets configuration error: {0}")]
    Config(String),

    /// Signing the JWT assertion failed.
    #[error("JWT signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Google returned a non-2xx status code.
    #[error("Google API returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the Google Sheets appender.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Path to the service-account JSON key.
    pub credentials_path: PathBuf,
    /// Target spreadsheet ID.
    pub sheet_id: String,
    /// A1 range whose table the rows are appended to.
    pub range: String,
    /// Sheets API origin.
    pub api_base: String,
}

impl SheetsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                  | Required | Default                            |
    /// |---------------------------|----------|------------------------------------|
    /// | `SHEET_ID`                | yes      | --                                 |
    /// | `GOOGLE_CREDENTIALS_PATH` | no       | `credentials.json`                 |
    /// | `SHEET_RANGE`             | no       | `Sheet1!A1`                        |
    /// | `SHEETS_API_BASE`         | no       | `https://sheets.googleapis.com`    |
    ///
    /// # Panics
    ///
    /// Panics if `SHEET_ID` is not set.
    pub fn from_env() -> Self {
        Self {
            credentials_path: std::env::var("GOOGLE_CREDENTIALS_PATH")
                .unwrap_or_else(|_| "credentials.json".into())
                .into(),
            sheet_id: std::env::var("SHEET_ID").expect("SHEET_ID must be set in the environment"),
            range: std::env::var("SHEET_RANGE").unwrap_or_else(|_| "Sheet1!A1".into()),
            api_base: std::env::var("SHEETS_API_BASE")
                .unwrap_or_else(|_| "https://sheets.googleapis.com".into()),
        }
    }

    /// Build the `values:append` URL for the configured sheet and range.
    pub fn append_url(&self) -> Result<reqwest::Url, SheetsError> {
        let mut url =
            reqwest::Url::parse(&self.api_base).map_err(|e| SheetsError::Config(e.to_string()))?;
        let append_segment = format!("{}:append", self.range);
        url.path_segments_mut()
            .map_err(|()| SheetsError::Config(format!("{} cannot be a base URL", self.api_base)))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.sheet_id.as_str(),
                "values",
                append_segment.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Row layout
// ---------------------------------------------------------------------------

/// Lay out a registration as one sheet row.
///
/// Columns: Timestamp, ACE ID, Name, Gender, Branch, Year, Payment, Email,
/// Phone, Interests, Goodies.
pub fn registration_row(registration: &Registration, submitted_at: &str) -> Vec<String> {
    vec![
        submitted_at.to_string(),
        registration.ace_id.clone(),
        registration.name.clone(),
        registration.gender.clone(),
        registration.branch.clone(),
        registration.year.clone(),
        registration.payment.clone(),
        registration.email.clone(),
        registration.phone.clone(),
        join_interests(&registration.interests),
        format_flag(registration.goodies).to_string(),
    ]
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Destination for registration rows.
#[async_trait]
pub trait SheetAppender: Send + Sync {
    async fn append_row(&self, row: Vec<String>) -> Result<(), SheetsError>;
}

// ---------------------------------------------------------------------------
// Google implementation
// ---------------------------------------------------------------------------

/// Fields of a service-account key file that the token flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key from the JSON downloaded from the Google Cloud console.
    pub fn from_json(json: &str) -> Result<Self, SheetsError> {
        serde_json::from_str(json).map_err(|e| SheetsError::Credentials(e.to_string()))
    }
}

/// Claims of the JWT assertion sent to the token endpoint.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Appends rows to a Google Sheet as a service account.
pub struct GoogleSheetsAppender {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    append_url: reqwest::Url,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsAppender {
    /// Read the key file named by `config` and prepare the client.
    pub async fn from_config(config: &SheetsConfig) -> Result<Self, SheetsError> {
        let json = tokio::fs::read_to_string(&config.credentials_path)
            .await
            .map_err(|e| {
                SheetsError::Credentials(format!(
                    "cannot read {}: {e}",
                    config.credentials_path.display()
                ))
            })?;
        Self::new(ServiceAccountKey::from_json(&json)?, config)
    }

    /// Build an appender from an already-parsed key.
    pub fn new(key: ServiceAccountKey, config: &SheetsConfig) -> Result<Self, SheetsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            key,
            encoding_key,
            append_url: config.append_url()?,
            client,
            token: Mutex::new(None),
        })
    }

    /// Return a valid access token, fetching a new one when the cache is stale.
    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = fresh.expires_in, "Google access token refreshed");
        Ok(fresh.access_token)
    }

    async fn fetch_token(&self) -> Result<TokenResponse, SheetsError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let assertion = encode(&header, &claims, &self.encoding_key)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json::<TokenResponse>().await?)
    }
}

#[async_trait]
impl SheetAppender for GoogleSheetsAppender {
    async fn append_row(&self, row: Vec<String>) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({ "values": [row] });

        let response = self
            .client
            .post(self.append_url.clone())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into [`SheetsError::HttpStatus`] carrying the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SheetsError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
