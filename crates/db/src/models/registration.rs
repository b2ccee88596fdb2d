//! Registration entity model and DTOs.

use ace_core::registration::{
    deserialize_flag, deserialize_trimmed, normalize_phone, MAX_TEXT_LENGTH,
};
use ace_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `registrations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Registration {
    pub id: DbId,
    pub ace_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub branch: String,
    pub gender: String,
    pub year: String,
    pub interests: Vec<String>,
    pub payment: String,
    pub goodies: bool,
    pub registered_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for a registration form submission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRegistration {
    #[validate(
        length(max = MAX_TEXT_LENGTH),
        custom(function = "ace_core::registration::validate_not_blank")
    )]
    #[serde(deserialize_with = "deserialize_trimmed")]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    #[serde(deserialize_with = "deserialize_trimmed")]
    pub email: String,
    #[validate(custom(function = "ace_core::registration::validate_phone"))]
    pub phone: String,
    #[validate(
        length(max = MAX_TEXT_LENGTH),
        custom(function = "ace_core::registration::validate_not_blank")
    )]
    #[serde(deserialize_with = "deserialize_trimmed")]
    pub branch: String,
    #[validate(
        length(max = MAX_TEXT_LENGTH),
        custom(function = "ace_core::registration::validate_not_blank")
    )]
    #[serde(deserialize_with = "deserialize_trimmed")]
    pub gender: String,
    #[validate(
        length(max = MAX_TEXT_LENGTH),
        custom(function = "ace_core::registration::validate_not_blank")
    )]
    #[serde(deserialize_with = "deserialize_trimmed")]
    pub year: String,
    #[serde(default)]
    #[validate(custom(function = "ace_core::registration::validate_interests"))]
    pub interests: Vec<String>,
    #[validate(
        length(max = MAX_TEXT_LENGTH),
        custom(function = "ace_core::registration::validate_not_blank")
    )]
    #[serde(deserialize_with = "deserialize_trimmed")]
    pub payment: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub goodies: bool,
}

impl CreateRegistration {
    /// Drop empty interests and strip phone formatting. Free text is
    /// already trimmed on deserialization.
    ///
    /// Call after validation; the stored phone is the normalised form used
    /// for deduplication.
    pub fn normalized(self) -> Self {
        Self {
            phone: normalize_phone(&self.phone),
            interests: self
                .interests
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> serde_json::Value {
        serde_json::json!({
            "name": "Asha Rao",
            "email": "asha@example.com",
            "phone": "98765 43210",
            "branch": "CSE",
            "gender": "Female",
            "year": "2nd",
            "interests": ["AI", " Robotics "],
            "payment": "Paid",
            "goodies": "Yes"
        })
    }

    #[test]
    fn valid_form_passes() {
        let input: CreateRegistration = serde_json::from_value(form()).unwrap();
        assert!(input.validate().is_ok());
        assert!(input.goodies);
    }

    #[test]
    fn missing_interests_and_goodies_default() {
        let mut v = form();
        v.as_object_mut().unwrap().remove("interests");
        v.as_object_mut().unwrap().remove("goodies");
        let input: CreateRegistration = serde_json::from_value(v).unwrap();
        assert!(input.interests.is_empty());
        assert!(!input.goodies);
    }

    #[test]
    fn invalid_fields_are_reported() {
        let mut v = form();
        v["email"] = "not-an-email".into();
        v["phone"] = "123".into();
        v["name"] = "   ".into();
        let input: CreateRegistration = serde_json::from_value(v).unwrap();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone"));
        assert!(fields.contains_key("name"));
        assert!(!fields.contains_key("branch"));
    }

    #[test]
    fn missing_required_field_fails_to_deserialize() {
        let mut v = form();
        v.as_object_mut().unwrap().remove("phone");
        assert!(serde_json::from_value::<CreateRegistration>(v).is_err());
    }

    #[test]
    fn padded_text_is_trimmed_before_validation() {
        let mut v = form();
        v["email"] = "  asha@example.com ".into();
        v["name"] = " Asha Rao\t".into();
        let input: CreateRegistration = serde_json::from_value(v).unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.email, "asha@example.com");
        assert_eq!(input.name, "Asha Rao");
    }

    #[test]
    fn normalization_trims_and_strips() {
        let input: CreateRegistration = serde_json::from_value(form()).unwrap();
        let n = input.normalized();
        assert_eq!(n.phone, "9876543210");
        assert_eq!(n.interests, vec!["AI", "Robotics"]);
    }
}
