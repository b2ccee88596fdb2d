//! Confirmation email delivery via SMTP.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport to send the
//! registration confirmation with the certificate PDF attached.

use std::time::Duration;

use ace_core::certificate::escape_html;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP relay.
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Limit for each SMTP command, kept below the workflow stage timeout.
const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Subject line of the confirmation email.
pub const CONFIRMATION_SUBJECT: &str = "ACE Registration Confirmation with Certificate";

/// File name of the attached certificate.
pub const CERTIFICATE_FILENAME: &str = "certificate.pdf";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// SMTP username.
    pub smtp_user: String,
    /// SMTP password.
    pub smtp_password: String,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_USER` or `SMTP_PASSWORD` is not set.
    ///
    /// | Variable        | Required | Default           |
    /// |-----------------|----------|-------------------|
    /// | `SMTP_USER`     | yes      | --                |
    /// | `SMTP_PASSWORD` | yes      | --                |
    /// | `SMTP_HOST`     | no       | `smtp.gmail.com`  |
    /// | `SMTP_PORT`     | no       | `587`             |
    /// | `SMTP_FROM`     | no       | `SMTP_USER`       |
    pub fn from_env() -> Option<Self> {
        let smtp_user = std::env::var("SMTP_USER").ok()?;
        let smtp_password = std::env::var("SMTP_PASSWORD").ok()?;
        Some(Self {
            smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.into()),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM").unwrap_or_else(|_| smtp_user.clone()),
            smtp_user,
            smtp_password,
        })
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Everything needed to send one confirmation.
#[derive(Debug, Clone)]
pub struct Confirmation<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub ace_id: &'a str,
    pub certificate: Vec<u8>,
    pub invite_link: Option<&'a str>,
}

/// HTML body of the confirmation email.
pub fn confirmation_body(name: &str, ace_id: &str, invite_link: Option<&str>) -> String {
    let mut body = format!(
        "<p>Dear {name},</p>\n\
         <p>Welcome to the <strong>ACE</strong> community! Your registration is complete \
         and your member ID is <strong>{ace_id}</strong>.</p>\n\
         <p>As a member you will have access to events and workshops, a network of \
         fellow members, and opportunities to lead, learn and grow.</p>\n\
         <p>Your membership certificate is attached to this email.</p>\n",
        name = escape_html(name),
        ace_id = escape_html(ace_id),
    );
    if let Some(link) = invite_link {
        let link = escape_html(link);
        body.push_str(&format!(
            "<p>Join the member group here: <a href=\"{link}\">{link}</a></p>\n"
        ));
    }
    body.push_str("<p>Warm wishes,<br>The ACE Team</p>\n");
    body
}

/// Assemble the multipart message: HTML body plus the PDF attachment.
pub fn build_message(from: &str, confirmation: Confirmation<'_>) -> Result<Message, EmailError> {
    let to = Mailbox::new(
        Some(confirmation.name.to_string()),
        confirmation.email.parse::<Address>()?,
    );
    let pdf_type =
        ContentType::parse("application/pdf").map_err(|e| EmailError::Build(e.to_string()))?;
    let attachment =
        Attachment::new(CERTIFICATE_FILENAME.to_string()).body(confirmation.certificate, pdf_type);
    let html = confirmation_body(
        confirmation.name,
        confirmation.ace_id,
        confirmation.invite_link,
    );

    Message::builder()
        .from(from.parse::<Mailbox>()?)
        .to(to)
        .subject(CONFIRMATION_SUBJECT)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::html(html))
                .singlepart(attachment),
        )
        .map_err(|e| EmailError::Build(e.to_string()))
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// Sends registration confirmations.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(&self, confirmation: Confirmation<'_>) -> Result<(), EmailError>;
}

/// Sends confirmation emails via an authenticated STARTTLS relay.
pub struct SmtpMailer {
    from_address: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a mailer; the relay connection is opened lazily per send.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(config.smtp_user, config.smtp_password))
            .build();
        Ok(Self {
            from_address: config.from_address,
            transport,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(&self, confirmation: Confirmation<'_>) -> Result<(), EmailError> {
        let ace_id = confirmation.ace_id.to_string();
        let to = confirmation.email.to_string();
        let message = build_message(&self.from_address, confirmation)?;
        self.transport.send(message).await?;

        tracing::info!(to = %to, ace_id = %ace_id, "Confirmation email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation(email: &str) -> Confirmation<'_> {
        Confirmation {
            name: "Asha Rao",
            email,
            ace_id: "25ACEC001",
            certificate: b"%PDF-1.7 test".to_vec(),
            invite_link: Some("https://chat.example/invite/abc"),
        }
    }

    #[test]
    fn body_escapes_name_and_includes_link() {
        let body = confirmation_body("<b>Asha</b>", "25ACEC001", Some("https://x.example/?a=1&b=2"));
        assert!(body.contains("Dear &lt;b&gt;Asha&lt;/b&gt;,"));
        assert!(body.contains("25ACEC001"));
        assert!(body.contains("https://x.example/?a=1&amp;b=2"));
    }

    #[test]
    fn body_without_link() {
        let body = confirmation_body("Asha", "25ACEC001", None);
        assert!(!body.contains("<a href"));
    }

    #[test]
    fn message_carries_subject_and_attachment() {
        let message = build_message("ace@example.com", confirmation("asha@example.com")).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains(CONFIRMATION_SUBJECT));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains(CERTIFICATE_FILENAME));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let result = build_message("ace@example.com", confirmation("not-an-email"));
        assert!(matches!(result, Err(EmailError::Address(_))));
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
