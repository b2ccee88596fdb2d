//! Registration field rules.
//!
//! Validation helpers plug into `validator` derives on the request DTO;
//! the formatting helpers produce the strings shown in the sheet row, the
//! certificate and the confirmation email.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::FixedOffset;
use regex::Regex;
use serde::{de, Deserialize, Deserializer};
use validator::ValidationError;

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of free-text fields (name, branch, ...).
pub const MAX_TEXT_LENGTH: u64 = 200;

/// Maximum number of interests a registrant may tick.
pub const MAX_INTERESTS: usize = 20;

/// Separator used wherever interests are flattened into one string.
pub const INTERESTS_SEPARATOR: &str = ", ";

/// Display offset used when `DISPLAY_UTC_OFFSET_MINUTES` is not configured (IST).
pub const DEFAULT_DISPLAY_OFFSET_MINUTES: i32 = 330;

/// A normalised phone number: optional leading `+`, then 7 to 15 digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Phone numbers
// ---------------------------------------------------------------------------

/// Strip formatting characters from a phone number.
///
/// Whitespace, `-`, `.`, `(` and `)` are removed so that `98765 43210` and
/// `98765-43210` deduplicate against each other.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '(' | ')'))
        .collect()
}

/// `validator` hook: the phone number must normalise to a plausible number.
pub fn validate_phone(raw: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(&normalize_phone(raw)) {
        Ok(())
    } else {
        Err(ValidationError::new("phone")
            .with_message(Cow::Borrowed("phone must contain 7 to 15 digits")))
    }
}

// ---------------------------------------------------------------------------
// Free text
// ---------------------------------------------------------------------------

/// `validator` hook: required text must contain something besides whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message(Cow::Borrowed("must not be blank")))
    } else {
        Ok(())
    }
}

/// `validator` hook: bound the interest list and each entry.
pub fn validate_interests(interests: &[String]) -> Result<(), ValidationError> {
    if interests.len() > MAX_INTERESTS {
        return Err(ValidationError::new("interests").with_message(Cow::Owned(format!(
            "at most {MAX_INTERESTS} interests may be selected"
        ))));
    }
    if interests.iter().any(|i| i.chars().count() as u64 > MAX_TEXT_LENGTH) {
        return Err(ValidationError::new("interests").with_message(Cow::Owned(format!(
            "each interest must be at most {MAX_TEXT_LENGTH} characters"
        ))));
    }
    Ok(())
}

/// Flatten interests into the single string stored in the sheet and certificate.
pub fn join_interests(interests: &[String]) -> String {
    interests.join(INTERESTS_SEPARATOR)
}

// ---------------------------------------------------------------------------
// Goodies flag
// ---------------------------------------------------------------------------

/// Parse the textual forms the registration form may send for a yes/no flag.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Render a flag the way the spreadsheet and certificate show it.
pub fn format_flag(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Serde adapter trimming surrounding whitespace from a string field, so
/// validation sees the value that is stored.
pub fn deserialize_trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

/// Serde adapter accepting either a JSON boolean or a yes/no string.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => {
            parse_flag(&s).ok_or_else(|| de::Error::custom(format!("invalid yes/no value '{s}'")))
        }
    }
}

// ---------------------------------------------------------------------------
// Display timestamp
// ---------------------------------------------------------------------------

/// Build the fixed offset used for human-readable timestamps.
pub fn display_offset(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Format a registration instant as `dd/mm/yyyy, h:mm:ss am` in `offset`.
pub fn display_timestamp(at: Timestamp, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%d/%m/%Y, %-I:%M:%S %P")
        .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize_phone(" 98765-43210 "), "9876543210");
        assert_eq!(normalize_phone("+91 (987) 654.3210"), "+919876543210");
    }

    #[test]
    fn phone_validation() {
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("98765abc10").is_err());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("++919876543210").is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("CSE").is_ok());
    }

    #[test]
    fn interests_are_bounded() {
        let many: Vec<String> = (0..=MAX_INTERESTS).map(|i| format!("topic {i}")).collect();
        assert!(validate_interests(&many).is_err());
        assert!(validate_interests(&["AI".to_string(), "Robotics".to_string()]).is_ok());
        assert!(validate_interests(&[]).is_ok());
    }

    #[test]
    fn interests_join_with_comma() {
        let interests = vec!["AI".to_string(), "Web".to_string()];
        assert_eq!(join_interests(&interests), "AI, Web");
        assert_eq!(join_interests(&[]), "");
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(format_flag(true), "Yes");
    }

    #[test]
    fn flag_deserializes_from_bool_or_text() {
        #[derive(Deserialize)]
        struct Form {
            #[serde(deserialize_with = "deserialize_flag")]
            goodies: bool,
        }

        let f: Form = serde_json::from_str(r#"{"goodies": true}"#).unwrap();
        assert!(f.goodies);
        let f: Form = serde_json::from_str(r#"{"goodies": "No"}"#).unwrap();
        assert!(!f.goodies);
        assert!(serde_json::from_str::<Form>(r#"{"goodies": "perhaps"}"#).is_err());
    }

    #[test]
    fn trimmed_strings_deserialize_without_padding() {
        #[derive(Deserialize)]
        struct Form {
            #[serde(deserialize_with = "deserialize_trimmed")]
            email: String,
        }

        let f: Form = serde_json::from_str(r#"{"email": " a@b.example\n"}"#).unwrap();
        assert_eq!(f.email, "a@b.example");
    }

    #[test]
    fn timestamp_in_ist() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 10, 16, 9, 34, 5).unwrap();
        let ist = display_offset(DEFAULT_DISPLAY_OFFSET_MINUTES).unwrap();
        assert_eq!(display_timestamp(at, ist), "16/10/2026, 3:04:05 pm");
    }

    #[test]
    fn out_of_range_offset() {
        assert!(display_offset(24 * 60).is_none());
        assert!(display_offset(-330).is_some());
    }
}
