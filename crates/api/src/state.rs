use std::sync::Arc;

use ace_delivery::{CertificateRenderer, InviteLinkSource, Mailer, SheetAppender};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: ace_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Outbound integrations called by the registration workflow.
    pub services: Services,
}

/// External systems the registration workflow talks to, in call order.
#[derive(Clone)]
pub struct Services {
    pub sheets: Arc<dyn SheetAppender>,
    pub certificates: Arc<dyn CertificateRenderer>,
    /// `None` when no invite server is configured; the email then omits the link.
    pub invites: Option<Arc<dyn InviteLinkSource>>,
    pub mailer: Arc<dyn Mailer>,
}
