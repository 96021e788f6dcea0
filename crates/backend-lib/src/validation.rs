// ============================
// crates/backend-lib/src/validation.rs
// ============================
//! Event payload validation.
//!
//! Malformed payloads are rejected without crashing the connection.
//! Signaling payloads (`offer`, `answer`, `candidate`) are deliberately
//! not validated here; they are opaque to the relay.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use huddle_common::ClientEvent;

use crate::error::AppError;

const MAX_DISPLAY_NAME_LENGTH: usize = 100;
const MAX_CHAT_CONTENT_LENGTH: usize = 4096;
const MAX_STATE_TYPE_LENGTH: usize = 64;

// Shape check only: three 4-char uppercase alphanumeric blocks. Generated
// codes use a narrower alphabet, but the store is the authority on whether
// a code exists.
static MEETING_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]{4}-[A-Z0-9]{4}-[A-Z0-9]{4}$").unwrap()
});
static DISPLAY_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^<>/\\{}()\[\];]*$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid meeting code: {0}")]
    InvalidMeetingCode(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a meeting code
pub fn validate_meeting_code(meeting_code: &str) -> ValidationResult<&str> {
    if meeting_code.is_empty() {
        return Err(ValidationError::InvalidMeetingCode(
            "Meeting code must not be empty".to_string(),
        ));
    }

    if !MEETING_CODE_REGEX.is_match(meeting_code) {
        return Err(ValidationError::InvalidMeetingCode(
            "Meeting code must look like XXXX-XXXX-XXXX".to_string(),
        ));
    }

    Ok(meeting_code)
}

/// Validate a display name
pub fn validate_display_name(name: &str) -> ValidationResult<&str> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidDisplayName(
            "Display name must not be empty".to_string(),
        ));
    }

    if name.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::InvalidDisplayName(format!(
            "Display name must be between 1 and {MAX_DISPLAY_NAME_LENGTH} characters"
        )));
    }

    if !DISPLAY_NAME_REGEX.is_match(name) {
        return Err(ValidationError::InvalidDisplayName(
            "Display name contains invalid characters".to_string(),
        ));
    }

    Ok(name)
}

/// Validate chat content. Emptiness after trimming is not an error here;
/// the chat path treats it as a silent no-op.
pub fn validate_chat_content(content: &str) -> ValidationResult<&str> {
    if content.len() > MAX_CHAT_CONTENT_LENGTH {
        return Err(ValidationError::InvalidContent(format!(
            "Message cannot exceed {MAX_CHAT_CONTENT_LENGTH} characters"
        )));
    }

    Ok(content)
}

/// Validates a client event before dispatch
pub fn validate_client_event(event: &ClientEvent) -> ValidationResult<()> {
    match event {
        ClientEvent::MeetingJoin { meeting_code, name } => {
            validate_meeting_code(meeting_code)?;
            validate_display_name(name)?;
        },
        ClientEvent::MeetingLeave { meeting_code } => {
            validate_meeting_code(meeting_code)?;
        },
        // Signaling payloads stay opaque; only the routing fields matter
        // and those are already typed.
        ClientEvent::WebrtcOffer { meeting_code, .. } => {
            validate_meeting_code(meeting_code)?;
        },
        ClientEvent::WebrtcAnswer { .. } | ClientEvent::WebrtcIceCandidate { .. } => {},
        ClientEvent::ChatMessage {
            meeting_code,
            content,
        } => {
            validate_meeting_code(meeting_code)?;
            validate_chat_content(content)?;
        },
        ClientEvent::ParticipantState {
            meeting_code,
            state_type,
            ..
        } => {
            validate_meeting_code(meeting_code)?;
            if state_type.is_empty() || state_type.len() > MAX_STATE_TYPE_LENGTH {
                return Err(ValidationError::InvalidContent(
                    "Invalid state type".to_string(),
                ));
            }
        },
    }

    Ok(())
}
