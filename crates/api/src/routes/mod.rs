pub mod health;
pub mod registration;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /registrations                                   submit a registration (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/registrations", registration::router())
}
