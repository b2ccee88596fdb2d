use std::net::SocketAddr;
use std::sync::Arc;

use ace_delivery::{
    CertificateConfig, ChromiumRenderer, EmailConfig, GoogleSheetsAppender, HttpInviteSource,
    InviteConfig, InviteLinkSource, SheetsConfig, SmtpMailer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ace_api::config::ServerConfig;
use ace_api::router::build_app_router;
use ace_api::state::{AppState, Services};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ace_api=debug,ace_delivery=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = ace_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    ace_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    ace_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Outbound services ---
    let sheets_config = SheetsConfig::from_env();
    let sheets = GoogleSheetsAppender::from_config(&sheets_config)
        .await
        .expect("Failed to initialise Google Sheets client");
    tracing::info!(sheet_id = %sheets_config.sheet_id, range = %sheets_config.range, "Sheets client ready");

    let certificate_config = CertificateConfig::from_env();
    tracing::info!(
        template = %certificate_config.template_path().display(),
        chrome = %certificate_config.chrome_bin,
        "Certificate renderer configured"
    );
    let certificates = ChromiumRenderer::new(certificate_config);

    let invites: Option<Arc<dyn InviteLinkSource>> = match InviteConfig::from_env() {
        Some(invite_config) => {
            tracing::info!(url = %invite_config.generate_url(), "Invite links enabled");
            let source =
                HttpInviteSource::new(invite_config).expect("Failed to build invite HTTP client");
            Some(Arc::new(source))
        }
        None => {
            tracing::info!("INVITE_SERVER_URL not set, invite links disabled");
            None
        }
    };

    let email_config =
        EmailConfig::from_env().expect("SMTP_USER and SMTP_PASSWORD must be set");
    tracing::info!(host = %email_config.smtp_host, port = email_config.smtp_port, "SMTP configured");
    let mailer = SmtpMailer::new(email_config).expect("Failed to build SMTP transport");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        services: Services {
            sheets: Arc::new(sheets),
            certificates: Arc::new(certificates),
            invites,
            mailer: Arc::new(mailer),
        },
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
