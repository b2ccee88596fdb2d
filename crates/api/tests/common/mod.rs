#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ace_api::config::{RegistrationConfig, ServerConfig};
use ace_api::router::build_app_router;
use ace_api::state::{AppState, Services};
use ace_delivery::{
    CertificateError, CertificateRenderer, Confirmation, EmailError, InviteError,
    InviteLinkSource, Mailer, SheetAppender, SheetsError,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    test_config_with_stage_timeout(Duration::from_secs(5))
}

/// Test config whose request timeout still exceeds the workflow budget.
pub fn test_config_with_stage_timeout(stage_timeout: Duration) -> ServerConfig {
    let registration = RegistrationConfig {
        stage_timeout,
        ..RegistrationConfig::default()
    };
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: registration.workflow_budget().as_secs() + 10,
        registration,
    }
}

// ---------------------------------------------------------------------------
// Fake outbound services
// ---------------------------------------------------------------------------

/// PDF bytes handed out by [`FakeRenderer`].
pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake certificate";

#[derive(Default)]
pub struct FakeSheets {
    pub rows: Mutex<Vec<Vec<String>>>,
    pub fail: bool,
}

#[async_trait]
impl SheetAppender for FakeSheets {
    async fn append_row(&self, row: Vec<String>) -> Result<(), SheetsError> {
        if self.fail {
            return Err(SheetsError::HttpStatus {
                status: 403,
                body: "caller does not have permission".to_string(),
            });
        }
        self.rows.lock().unwrap().push(row);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    pub rendered: Mutex<Vec<BTreeMap<&'static str, String>>>,
    pub fail: bool,
    /// Sleep this long before answering.
    pub delay: Option<Duration>,
}

#[async_trait]
impl CertificateRenderer for FakeRenderer {
    async fn render(
        &self,
        values: &BTreeMap<&'static str, String>,
    ) -> Result<Vec<u8>, CertificateError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CertificateError::Timeout(60));
        }
        self.rendered.lock().unwrap().push(values.clone());
        Ok(FAKE_PDF.to_vec())
    }
}

pub struct FakeInvites {
    pub link: Option<String>,
}

#[async_trait]
impl InviteLinkSource for FakeInvites {
    async fn fetch_link(&self) -> Result<String, InviteError> {
        self.link.clone().ok_or(InviteError::MissingLink)
    }
}

/// What [`FakeMailer`] saw for one confirmation.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub email: String,
    pub ace_id: String,
    pub certificate: Vec<u8>,
    pub invite_link: Option<String>,
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: bool,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_confirmation(&self, confirmation: Confirmation<'_>) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Build("relay refused".to_string()));
        }
        self.sent.lock().unwrap().push(SentMail {
            email: confirmation.email.to_string(),
            ace_id: confirmation.ace_id.to_string(),
            certificate: confirmation.certificate,
            invite_link: confirmation.invite_link.map(str::to_string),
        });
        Ok(())
    }
}

/// Handles on the fakes so tests can inspect what the workflow did.
#[derive(Clone, Default)]
pub struct Fakes {
    pub sheets: Arc<FakeSheets>,
    pub renderer: Arc<FakeRenderer>,
    pub invites: Option<Arc<FakeInvites>>,
    pub mailer: Arc<FakeMailer>,
}

impl Fakes {
    pub fn services(&self) -> Services {
        Services {
            sheets: self.sheets.clone(),
            certificates: self.renderer.clone(),
            invites: self
                .invites
                .clone()
                .map(|i| i as Arc<dyn InviteLinkSource>),
            mailer: self.mailer.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// App builders
// ---------------------------------------------------------------------------

/// Build the full application router with all middleware layers, using the
/// given database pool and fakes.
pub fn build_test_app_with(pool: PgPool, fakes: &Fakes) -> Router {
    build_test_app_with_config(pool, fakes, test_config())
}

/// Build the app with a custom configuration.
pub fn build_test_app_with_config(pool: PgPool, fakes: &Fakes, config: ServerConfig) -> Router {
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        services: fakes.services(),
    };
    build_app_router(state, &config)
}

/// Build the app with well-behaved fakes.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, &Fakes::default())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: &serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A valid registration form body.
pub fn registration_form(phone: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "Asha Rao",
        "email": "asha@example.com",
        "phone": phone,
        "branch": "CSE",
        "gender": "Female",
        "year": "2nd",
        "interests": ["AI", "Robotics"],
        "payment": "Paid",
        "goodies": "Yes"
    })
}

pub async fn registration_count(pool: &PgPool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations")
        .fetch_one(pool)
        .await
        .unwrap();
    count
}
