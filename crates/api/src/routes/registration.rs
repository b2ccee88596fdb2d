//! Route definitions for registrations.

use axum::routing::post;
use axum::Router;

use crate::handlers::registration;
use crate::state::AppState;

/// Registration routes, mounted at `/registrations` by `api_routes()`.
///
/// ```text
/// POST   /                  -> register
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(registration::register))
}

/// Root-level `POST /register`, the path the registration form posts to.
///
/// Success is `201 Created`. The form only checks `response.ok`, so any
/// 2xx status is accepted there.
pub fn form_router() -> Router<AppState> {
    Router::new().route("/register", post(registration::register))
}
