//! Repository for the `registrations` table.

use ace_core::ace_id::{AceIdError, AceIdFormat};
use sqlx::{PgConnection, PgPool};

use crate::models::registration::{CreateRegistration, Registration};

/// Column list for `registrations` queries.
const COLUMNS: &str = "\
    id, ace_id, name, email, phone, branch, gender, year, \
    interests, payment, goodies, registered_at, created_at, updated_at";

/// Advisory lock key serialising ACE ID allocation ("ACEID" in ASCII).
pub const ACE_ID_LOCK_KEY: i64 = 0x41_43_45_49_44;

/// Failure while allocating an ACE ID and inserting the row.
///
/// The two variants map to different workflow stages so callers can report
/// which step failed.
#[derive(Debug, thiserror::Error)]
pub enum CreateRegistrationError {
    /// Reading the last ACE ID or deriving the next one failed.
    #[error("ACE ID generation failed: {0}")]
    IdGeneration(String),

    /// The INSERT (or its transaction) failed.
    #[error("Registration insert failed: {0}")]
    Insert(#[source] sqlx::Error),
}

impl From<AceIdError> for CreateRegistrationError {
    fn from(err: AceIdError) -> Self {
        CreateRegistrationError::IdGeneration(err.to_string())
    }
}

/// Provides persistence for registrations.
pub struct RegistrationRepo;

impl RegistrationRepo {
    /// Find a registration by its normalised phone number.
    pub async fn find_by_phone(
        pool: &PgPool,
        phone: &str,
    ) -> Result<Option<Registration>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM registrations WHERE phone = $1");
        sqlx::query_as::<_, Registration>(&query)
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    /// ACE ID of the most recently inserted registration, if any.
    pub async fn last_ace_id(conn: &mut PgConnection) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT ace_id FROM registrations ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(conn)
        .await
    }

    /// Allocate the next ACE ID and insert the registration under it.
    ///
    /// Allocation and insert run in one transaction holding an advisory
    /// lock, so concurrent submissions never read the same last ID.
    pub async fn create_next(
        pool: &PgPool,
        format: &AceIdFormat,
        input: &CreateRegistration,
    ) -> Result<Registration, CreateRegistrationError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| CreateRegistrationError::IdGeneration(e.to_string()))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ACE_ID_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| CreateRegistrationError::IdGeneration(e.to_string()))?;

        let last = Self::last_ace_id(&mut *tx)
            .await
            .map_err(|e| CreateRegistrationError::IdGeneration(e.to_string()))?;
        let ace_id = format.next_after(last.as_deref())?;

        let query = format!(
            "INSERT INTO registrations \
                (ace_id, name, email, phone, branch, gender, year, \
                 interests, payment, goodies) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        let registration = sqlx::query_as::<_, Registration>(&query)
            .bind(&ace_id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.branch)
            .bind(&input.gender)
            .bind(&input.year)
            .bind(&input.interests)
            .bind(&input.payment)
            .bind(input.goodies)
            .fetch_one(&mut *tx)
            .await
            .map_err(CreateRegistrationError::Insert)?;

        tx.commit().await.map_err(CreateRegistrationError::Insert)?;

        tracing::debug!(ace_id = %registration.ace_id, "Registration row inserted");
        Ok(registration)
    }
}
