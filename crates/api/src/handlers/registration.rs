//! Handler for registration form submissions.
//!
//! The workflow is strictly sequential: phone check, ID allocation and
//! insert, sheet append, certificate render, optional invite link, email.
//! Each stage runs under the configured stage timeout and fails
//! independently with its own stage message. Nothing is rolled back when a
//! stage after the insert fails.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use ace_core::error::CoreError;
use ace_core::registration::display_timestamp;
use ace_core::stage::Stage;
use ace_db::models::registration::CreateRegistration;
use ace_db::repositories::{CreateRegistrationError, RegistrationRepo};
use ace_delivery::certificate::certificate_values;
use ace_delivery::sheets::registration_row;
use ace_delivery::Confirmation;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::{unique_violation_constraint, AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::state::AppState;

/// Conflict message for an already-registered phone number.
pub const PHONE_TAKEN: &str = "Phone number already registered";

/// Unique constraint guarding phone numbers.
const PHONE_CONSTRAINT: &str = "uq_registrations_phone";

/// Body returned once every stage has succeeded.
#[derive(Debug, Serialize)]
pub struct RegistrationReceipt {
    pub success: bool,
    pub ace_id: String,
}

/// Log a stage failure with its cause and turn it into the client error.
fn stage_failed(stage: Stage, ace_id: Option<&str>, err: &dyn Display) -> AppError {
    tracing::error!(stage = %stage, ace_id, error = %err, "Registration stage failed");
    AppError::StageFailed {
        stage,
        details: err.to_string(),
    }
}

fn stage_timed_out(stage: Stage, ace_id: Option<&str>, limit: Duration) -> AppError {
    stage_failed(
        stage,
        ace_id,
        &format!("timed out after {}s", limit.as_secs_f32()),
    )
}

/// Run one stage under `limit`, mapping both its error and an elapsed
/// limit to [`AppError::StageFailed`].
async fn run_stage<T, E, F>(
    stage: Stage,
    ace_id: Option<&str>,
    limit: Duration,
    fut: F,
) -> AppResult<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(stage_failed(stage, ace_id, &err)),
        Err(_) => Err(stage_timed_out(stage, ace_id, limit)),
    }
}

/// Map an allocation or insert failure to the client error.
///
/// A phone unique violation means a concurrent submission for the same
/// number won the insert, so it gets the same 409 as the lookup.
pub fn creation_error(err: CreateRegistrationError) -> AppError {
    match err {
        CreateRegistrationError::Insert(e)
            if unique_violation_constraint(&e) == Some(PHONE_CONSTRAINT) =>
        {
            tracing::info!("Rejected duplicate phone number at insert");
            CoreError::Conflict(PHONE_TAKEN.into()).into()
        }
        CreateRegistrationError::IdGeneration(msg) => {
            stage_failed(Stage::IdGeneration, None, &msg)
        }
        CreateRegistrationError::Insert(e) => stage_failed(Stage::Insert, None, &e),
    }
}

// ---------------------------------------------------------------------------
// POST /register, POST /api/v1/registrations
// ---------------------------------------------------------------------------

/// Register a member and deliver their certificate.
///
/// Answers `201 Created` with `{ "success": true, "ace_id": ... }`. The form
/// frontend only checks for a 2xx status.
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CreateRegistration>,
) -> AppResult<impl IntoResponse> {
    let input = input.normalized();
    let limit = state.config.registration.stage_timeout;

    let existing = run_stage(
        Stage::PhoneCheck,
        None,
        limit,
        RegistrationRepo::find_by_phone(&state.pool, &input.phone),
    )
    .await?;
    if existing.is_some() {
        tracing::info!(phone = %input.phone, "Rejected duplicate phone number");
        return Err(CoreError::Conflict(PHONE_TAKEN.into()).into());
    }

    let registration = tokio::time::timeout(
        limit,
        RegistrationRepo::create_next(&state.pool, &state.config.registration.ace_id, &input),
    )
    .await
    .map_err(|_| stage_timed_out(Stage::Insert, None, limit))?
    .map_err(creation_error)?;
    let ace_id = registration.ace_id.as_str();
    tracing::info!(ace_id, "Registration stored");

    let submitted_at = display_timestamp(
        registration.registered_at,
        state.config.registration.display_offset,
    );
    let services = &state.services;

    run_stage(
        Stage::Sheet,
        Some(ace_id),
        limit,
        services
            .sheets
            .append_row(registration_row(&registration, &submitted_at)),
    )
    .await?;

    let values = certificate_values(&registration, &submitted_at);
    let certificate = run_stage(
        Stage::Certificate,
        Some(ace_id),
        limit,
        services.certificates.render(&values),
    )
    .await?;

    let invite_link = match &services.invites {
        Some(invites) => {
            Some(run_stage(Stage::InviteLink, Some(ace_id), limit, invites.fetch_link()).await?)
        }
        None => None,
    };

    run_stage(
        Stage::Email,
        Some(ace_id),
        limit,
        services.mailer.send_confirmation(Confirmation {
            name: &registration.name,
            email: &registration.email,
            ace_id,
            certificate,
            invite_link: invite_link.as_deref(),
        }),
    )
    .await?;

    tracing::info!(ace_id, "Registered and emailed");

    Ok((
        StatusCode::CREATED,
        Json(RegistrationReceipt {
            success: true,
            ace_id: registration.ace_id.clone(),
        }),
    ))
}
