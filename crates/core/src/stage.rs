//! Named stages of the registration workflow.
//!
//! Each stage after validation calls one external system. A failure is
//! reported to the client with the stage's fixed message only.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PhoneCheck,
    IdGeneration,
    Insert,
    Sheet,
    Certificate,
    InviteLink,
    Email,
}

impl Stage {
    /// Client-facing message for a failure in this stage.
    pub fn failure_message(self) -> &'static str {
        match self {
            Stage::PhoneCheck => "Database error while checking phone",
            Stage::IdGeneration => "ACE ID generation failed",
            Stage::Insert => "Failed to insert into DB",
            Stage::Sheet => "Failed to update Google Sheet",
            Stage::Certificate => "Failed to render certificate",
            Stage::InviteLink => "Failed to fetch invite link",
            Stage::Email => "Failed to send email",
        }
    }

    /// Short identifier used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::PhoneCheck => "phone_check",
            Stage::IdGeneration => "id_generation",
            Stage::Insert => "insert",
            Stage::Sheet => "sheet",
            Stage::Certificate => "certificate",
            Stage::InviteLink => "invite_link",
            Stage::Email => "email",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
