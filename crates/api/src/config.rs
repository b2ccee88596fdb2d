use std::time::Duration;

use ace_core::ace_id::{AceIdFormat, DEFAULT_PREFIX, DEFAULT_WIDTH};
use ace_core::registration::{display_offset, DEFAULT_DISPLAY_OFFSET_MINUTES};
use chrono::FixedOffset;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must exceed the registration
    /// workflow budget so a slow stage is reported as that stage failing
    /// rather than as a bare timeout (default: budget + 30).
    pub request_timeout_secs: u64,
    /// Registration workflow settings.
    pub registration: RegistrationConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `5001`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | workflow budget + `30`     |
    ///
    /// # Panics
    ///
    /// Panics if a variable does not parse or if `REQUEST_TIMEOUT_SECS`
    /// does not exceed the workflow budget.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5001".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let registration = RegistrationConfig::from_env();

        let request_timeout_secs: u64 = match std::env::var("REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .expect("REQUEST_TIMEOUT_SECS must be a valid u64"),
            Err(_) => registration.workflow_budget().as_secs() + REQUEST_TIMEOUT_MARGIN_SECS,
        };

        let config = Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            registration,
        };
        if let Err(msg) = config.check_timeouts() {
            panic!("{msg}");
        }
        config
    }

    /// Verify the request timeout leaves room for every stage to time out
    /// on its own.
    pub fn check_timeouts(&self) -> Result<(), String> {
        let budget = self.registration.workflow_budget().as_secs();
        if self.request_timeout_secs > budget {
            Ok(())
        } else {
            Err(format!(
                "REQUEST_TIMEOUT_SECS ({}) must exceed the registration workflow budget \
                 ({budget}s = {TIMED_STAGES} stages x STAGE_TIMEOUT_SECS)",
                self.request_timeout_secs
            ))
        }
    }
}

/// Slack added on top of the workflow budget for the default request timeout.
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 30;

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Default limit for one workflow stage. Above the 60 s PDF render and the
/// 30 s + 30 s Google token and append calls.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 75;

/// Stages run under [`RegistrationConfig::stage_timeout`]: phone check,
/// ID allocation with insert, sheet, certificate, invite link and email.
pub const TIMED_STAGES: u32 = 6;

/// Settings that shape the stored and displayed registration.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// ACE ID prefix and padding.
    pub ace_id: AceIdFormat,
    /// Offset used for the timestamp on the sheet and certificate.
    pub display_offset: FixedOffset,
    /// Upper bound for each workflow stage.
    pub stage_timeout: Duration,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            ace_id: AceIdFormat::default(),
            display_offset: display_offset(DEFAULT_DISPLAY_OFFSET_MINUTES)
                .expect("default display offset is in range"),
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
        }
    }
}

impl RegistrationConfig {
    /// | Env Var                      | Default  |
    /// |------------------------------|----------|
    /// | `ACE_ID_PREFIX`              | `25ACEC` |
    /// | `ACE_ID_WIDTH`               | `3`      |
    /// | `DISPLAY_UTC_OFFSET_MINUTES` | `330`    |
    /// | `STAGE_TIMEOUT_SECS`         | `75`     |
    pub fn from_env() -> Self {
        let prefix = std::env::var("ACE_ID_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.into());

        let width: usize = std::env::var("ACE_ID_WIDTH")
            .unwrap_or_else(|_| DEFAULT_WIDTH.to_string())
            .parse()
            .expect("ACE_ID_WIDTH must be a valid usize");

        let offset_minutes: i32 = std::env::var("DISPLAY_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| DEFAULT_DISPLAY_OFFSET_MINUTES.to_string())
            .parse()
            .expect("DISPLAY_UTC_OFFSET_MINUTES must be a valid i32");

        let stage_timeout_secs: u64 = std::env::var("STAGE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_STAGE_TIMEOUT_SECS.to_string())
            .parse()
            .expect("STAGE_TIMEOUT_SECS must be a valid u64");

        Self {
            ace_id: AceIdFormat::new(prefix, width),
            display_offset: display_offset(offset_minutes)
                .expect("DISPLAY_UTC_OFFSET_MINUTES must be within +/- 24 hours"),
            stage_timeout: Duration::from_secs(stage_timeout_secs),
        }
    }

    /// Longest a registration can take with every stage at its limit.
    pub fn workflow_budget(&self) -> Duration {
        self.stage_timeout * TIMED_STAGES
    }
}
