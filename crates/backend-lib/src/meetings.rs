// ============================
// huddle-backend-lib/src/meetings.rs
// ============================
//! Meeting lifecycle operations against the durable store.
//!
//! These are the request/response-style calls: store failures propagate to
//! the caller, unlike the fire-and-forget chat path.

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use huddle_common::{Meeting, MeetingRole, Participant, ParticipantStatus, StoredMessage};

use crate::error::AppError;
use crate::storage::MeetingStore;

/// Human-readable code alphabet. 0/O and 1/I are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Collision-check attempts before giving up on a fresh code
const CODE_RETRIES: usize = 5;

fn code_block() -> String {
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a meeting code of the form `XXXX-XXXX-XXXX`
pub(crate) fn generate_meeting_code() -> String {
    format!("{}-{}-{}", code_block(), code_block(), code_block())
}

/// Create a meeting with a collision-checked code and seed the host's
/// participant row.
pub async fn create_meeting<S: MeetingStore>(
    store: &S,
    host_id: &str,
    title: Option<String>,
) -> Result<Meeting, AppError> {
    let mut code = generate_meeting_code();
    for _ in 0..CODE_RETRIES {
        if store.find_by_code(&code).await?.is_none() {
            break;
        }
        code = generate_meeting_code();
    }

    let meeting = Meeting {
        id: Uuid::new_v4(),
        meeting_code: code,
        host_id: host_id.to_string(),
        title,
        created_at: Utc::now(),
    };
    store.insert_meeting(&meeting).await?;
    store
        .upsert_participant(
            meeting.id,
            host_id,
            MeetingRole::Host,
            ParticipantStatus::Joined,
        )
        .await?;

    Ok(meeting)
}

/// Join a meeting: find it by code and upsert the user's participant row.
/// The host keeps the Host role on rejoin; everyone else is a Participant.
pub async fn join_meeting<S: MeetingStore>(
    store: &S,
    meeting_code: &str,
    user_id: &str,
) -> Result<(Meeting, Participant), AppError> {
    let meeting = store
        .find_by_code(meeting_code)
        .await?
        .ok_or(AppError::MeetingNotFound)?;

    let role = if meeting.host_id == user_id {
        MeetingRole::Host
    } else {
        MeetingRole::Participant
    };
    let participant = store
        .upsert_participant(meeting.id, user_id, role, ParticipantStatus::Joined)
        .await?;

    Ok((meeting, participant))
}

/// Flip the user's participant row to Left with a timestamp
pub async fn leave_meeting<S: MeetingStore>(
    store: &S,
    meeting_code: &str,
    user_id: &str,
) -> Result<(), AppError> {
    let meeting = store
        .find_by_code(meeting_code)
        .await?
        .ok_or(AppError::MeetingNotFound)?;

    store.mark_left(meeting.id, user_id).await
}

/// All persisted messages for a meeting, in creation order
pub async fn list_messages<S: MeetingStore>(
    store: &S,
    meeting_code: &str,
) -> Result<Vec<StoredMessage>, AppError> {
    let meeting = store
        .find_by_code(meeting_code)
        .await?
        .ok_or(AppError::MeetingNotFound)?;

    store.list_messages(meeting.id).await
}
