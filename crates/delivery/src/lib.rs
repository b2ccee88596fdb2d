//! Outbound integrations used by the registration workflow.
//!
//! Each integration sits behind an `async_trait` so the HTTP layer can be
//! driven with in-process fakes:
//!
//! - [`SheetAppender`]: appends a row to the shared Google Sheet.
//! - [`CertificateRenderer`]: renders the certificate template to PDF
//!   with headless Chromium.
//! - [`InviteLinkSource`]: fetches a community invite link.
//! - [`Mailer`]: emails the confirmation with the certificate attached.

pub mod certificate;
pub mod email;
pub mod invite;
pub mod sheets;

pub use certificate::{CertificateConfig, CertificateError, CertificateRenderer, ChromiumRenderer};
pub use email::{Confirmation, EmailConfig, EmailError, Mailer, SmtpMailer};
pub use invite::{HttpInviteSource, InviteConfig, InviteError, InviteLinkSource};
pub use sheets::{GoogleSheetsAppender, SheetAppender, SheetsConfig, SheetsError};
