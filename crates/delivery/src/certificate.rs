//! Certificate PDF rendering with headless Chromium.
//!
//! The HTML template is filled in, written next to the template (so
//! relative `src`/`url()` references to images resolve), and printed to
//! PDF by a Chromium child process. Page size and margins come from the
//! template's `@page` rule.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ace_core::certificate::render_template;
use ace_core::registration::{format_flag, join_interests};
use ace_db::models::registration::Registration;
use async_trait::async_trait;

/// Default template file inside the template directory.
pub const DEFAULT_TEMPLATE_FILE: &str = "certificate.html";

/// Default wall-clock limit for one Chromium run.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Every PDF starts with this magic.
const PDF_MAGIC: &[u8] = b"%PDF";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate template {path} could not be read: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chromium binary '{0}' could not be started: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("chromium exited with code {exit_code:?}: {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("chromium did not finish within {0} seconds")]
    Timeout(u64),

    #[error("chromium produced no valid PDF")]
    InvalidOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CertificateConfig {
    /// Directory holding the template and the images it references.
    pub template_dir: PathBuf,
    /// Template file name inside `template_dir`.
    pub template_file: String,
    /// Chromium/Chrome executable.
    pub chrome_bin: String,
    /// Wall-clock limit for one render.
    pub timeout_secs: u64,
}

impl CertificateConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                    | Default            |
    /// |-----------------------------|--------------------|
    /// | `TEMPLATE_DIR`              | `templates`        |
    /// | `CERTIFICATE_TEMPLATE`      | `certificate.html` |
    /// | `CHROME_BIN`                | `chromium`         |
    /// | `PDF_TIMEOUT_SECS`          | `60`               |
    pub fn from_env() -> Self {
        Self {
            template_dir: std::env::var("TEMPLATE_DIR")
                .unwrap_or_else(|_| "templates".into())
                .into(),
            template_file: std::env::var("CERTIFICATE_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_TEMPLATE_FILE.into()),
            chrome_bin: std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".into()),
            timeout_secs: std::env::var("PDF_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(&self.template_file)
    }
}

// ---------------------------------------------------------------------------
// Placeholder values
// ---------------------------------------------------------------------------

/// Values available to the certificate template.
///
/// Placeholders: `ace_id`, `name`, `phone`, `email`, `year`, `gender`,
/// `branch`, `interests`, `goodies`, `payment`, `timestamp`.
pub fn certificate_values(
    registration: &Registration,
    submitted_at: &str,
) -> BTreeMap<&'static str, String> {
    BTreeMap::from([
        ("ace_id", registration.ace_id.clone()),
        ("name", registration.name.clone()),
        ("phone", registration.phone.clone()),
        ("email", registration.email.clone()),
        ("year", registration.year.clone()),
        ("gender", registration.gender.clone()),
        ("branch", registration.branch.clone()),
        ("interests", join_interests(&registration.interests)),
        ("goodies", format_flag(registration.goodies).to_string()),
        ("payment", registration.payment.clone()),
        ("timestamp", submitted_at.to_string()),
    ])
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Turns template values into PDF bytes.
#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(
        &self,
        values: &BTreeMap<&'static str, String>,
    ) -> Result<Vec<u8>, CertificateError>;
}

// ---------------------------------------------------------------------------
// Chromium implementation
// ---------------------------------------------------------------------------

pub struct ChromiumRenderer {
    config: CertificateConfig,
}

impl ChromiumRenderer {
    pub fn new(config: CertificateConfig) -> Self {
        Self { config }
    }

    /// Read the template, failing with the path in the message.
    async fn load_template(&self) -> Result<String, CertificateError> {
        let path = self.config.template_path();
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CertificateError::Template {
                path: path.display().to_string(),
                source,
            })
    }

    /// Run Chromium over `html_path`, writing the PDF to `pdf_path`.
    async fn print_to_pdf(&self, html_path: &Path, pdf_path: &Path) -> Result<(), CertificateError> {
        let page_url = reqwest::Url::from_file_path(html_path).map_err(|()| {
            CertificateError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not an absolute path", html_path.display()),
            ))
        })?;

        let mut command = tokio::process::Command::new(&self.config.chrome_bin);
        command
            .args(chromium_args(pdf_path))
            .arg(page_url.as_str())
            .kill_on_drop(true);

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.output(),
        )
        .await
        .map_err(|_| CertificateError::Timeout(self.config.timeout_secs))?
        .map_err(|e| CertificateError::Spawn(self.config.chrome_bin.clone(), e))?;

        if !output.status.success() {
            return Err(CertificateError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

/// Command-line flags for a headless print.
fn chromium_args(pdf_path: &Path) -> Vec<String> {
    vec![
        "--headless=new".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--allow-file-access-from-files".to_string(),
        "--no-pdf-header-footer".to_string(),
        "--run-all-compositor-stages-before-draw".to_string(),
        format!("--print-to-pdf={}", pdf_path.display()),
    ]
}

#[async_trait]
impl CertificateRenderer for ChromiumRenderer {
    async fn render(
        &self,
        values: &BTreeMap<&'static str, String>,
    ) -> Result<Vec<u8>, CertificateError> {
        let template = self.load_template().await?;
        let html = render_template(&template, values);

        // Written beside the template so relative asset paths resolve.
        let template_dir = tokio::fs::canonicalize(&self.config.template_dir).await?;
        let html_file = tempfile::Builder::new()
            .prefix(".certificate-")
            .suffix(".html")
            .tempfile_in(&template_dir)?;
        tokio::fs::write(html_file.path(), html).await?;

        let out_dir = tempfile::tempdir()?;
        let pdf_path = out_dir.path().join("certificate.pdf");

        self.print_to_pdf(html_file.path(), &pdf_path).await?;

        let pdf = tokio::fs::read(&pdf_path)
            .await
            .map_err(|_| CertificateError::InvalidOutput)?;
        if !pdf.starts_with(PDF_MAGIC) {
            return Err(CertificateError::InvalidOutput);
        }

        tracing::debug!(bytes = pdf.len(), "Certificate rendered");
        Ok(pdf)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn registration() -> Registration {
        Registration {
            id: 7,
            ace_id: "25ACEC007".to_string(),
            name: "Ravi <Kumar>".to_string(),
            email: "ravi@example.com".to_string(),
            phone: "9123456780".to_string(),
            branch: "ECE".to_string(),
            gender: "Male".to_string(),
            year: "3rd".to_string(),
            interests: vec!["IoT".to_string()],
            payment: "Pending".to_string(),
            goodies: true,
            registered_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config(dir: &Path, chrome_bin: &str) -> CertificateConfig {
        CertificateConfig {
            template_dir: dir.to_path_buf(),
            template_file: DEFAULT_TEMPLATE_FILE.to_string(),
            chrome_bin: chrome_bin.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn values_cover_every_field() {
        let values = certificate_values(&registration(), "16/10/2026, 3:04:05 pm");
        assert_eq!(values["ace_id"], "25ACEC007");
        assert_eq!(values["interests"], "IoT");
        assert_eq!(values["goodies"], "Yes");
        assert_eq!(values["timestamp"], "16/10/2026, 3:04:05 pm");
        assert_eq!(values.len(), 11);
    }

    #[test]
    fn shipped_template_is_self_contained() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../templates");
        let html = std::fs::read_to_string(dir.join(DEFAULT_TEMPLATE_FILE)).unwrap();

        let rendered = render_template(&html, &certificate_values(&registration(), "now"));
        assert!(!rendered.contains("{{"), "unfilled placeholder left in template");
        assert!(rendered.contains("25ACEC007"));

        for chunk in html.split("src=\"").skip(1) {
            let asset = chunk.split('"').next().unwrap();
            assert!(dir.join(asset).is_file(), "template references missing {asset}");
        }
    }

    #[test]
    fn print_flag_points_at_output() {
        let args = chromium_args(Path::new("/tmp/out/certificate.pdf"));
        assert!(args.contains(&"--print-to-pdf=/tmp/out/certificate.pdf".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--headless")));
    }

    #[tokio::test]
    async fn missing_template_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChromiumRenderer::new(config(dir.path(), "chromium"));
        let values = certificate_values(&registration(), "now");

        let result = renderer.render(&values).await;
        assert_matches!(result, Err(CertificateError::Template { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_TEMPLATE_FILE), "<p>{{name}}</p>").unwrap();
        let renderer =
            ChromiumRenderer::new(config(dir.path(), "/nonexistent/ace-chromium-binary"));
        let values = certificate_values(&registration(), "now");

        let result = renderer.render(&values).await;
        let err = assert_matches!(result, Err(CertificateError::Spawn(bin, e)) => (bin, e));
        assert_eq!(err.0, "/nonexistent/ace-chromium-binary");
        assert_eq!(err.1.kind(), std::io::ErrorKind::NotFound);

        // The scratch HTML file is removed once rendering finishes.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".certificate-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
