// ============================
// huddle-backend-lib/src/storage.rs
// ============================
//! Durable meeting store abstraction with a flat-file implementation.
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use uuid::Uuid;

use huddle_common::{Meeting, MeetingRole, Participant, ParticipantStatus, StoredMessage};

use crate::error::AppError;

/// Trait for durable meeting storage backends
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Look a meeting up by its human-readable code
    async fn find_by_code(&self, meeting_code: &str) -> Result<Option<Meeting>, AppError>;

    /// Persist a new meeting
    async fn insert_meeting(&self, meeting: &Meeting) -> Result<(), AppError>;

    /// Upsert the (meeting, user) participant row. First join creates the
    /// row with `role`; later joins flip the status back to Joined and
    /// clear `left_at`, keeping the original role and join time.
    async fn upsert_participant(
        &self,
        meeting_id: Uuid,
        user_id: &str,
        role: MeetingRole,
        status: ParticipantStatus,
    ) -> Result<Participant, AppError>;

    /// Flip a participant row to Left with a timestamp. A missing row is
    /// a no-op, not an error.
    async fn mark_left(&self, meeting_id: Uuid, user_id: &str) -> Result<(), AppError>;

    /// All messages for a meeting, in creation order
    async fn list_messages(&self, meeting_id: Uuid) -> Result<Vec<StoredMessage>, AppError>;

    /// Persist one chat message and return the stored row
    async fn save_message(
        &self,
        meeting_id: Uuid,
        sender_id: &str,
        content: &str,
    ) -> Result<StoredMessage, AppError>;
}

/// Flat-file implementation of the `MeetingStore` trait.
///
/// Layout: one directory per meeting code under `meetings/`, holding
/// `meeting.json`, `participants.json` and a `messages.log` of JSON lines.
#[derive(Clone)]
pub struct FlatFileStore {
    root: PathBuf,
    /// meeting id -> code, so message operations keyed by id can find
    /// their directory without rescanning
    codes: Arc<DashMap<Uuid, String>>,
}

impl FlatFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("meetings"))?;
        Ok(Self {
            root,
            codes: Arc::new(DashMap::new()),
        })
    }

    fn meeting_dir(&self, meeting_code: &str) -> PathBuf {
        self.root.join("meetings").join(meeting_code)
    }

    /// Resolve a meeting id to its code, scanning the meetings directory
    /// once when the cache is cold (e.g. after a restart).
    async fn resolve_code(&self, meeting_id: Uuid) -> Result<String, AppError> {
        if let Some(code) = self.codes.get(&meeting_id) {
            return Ok(code.clone());
        }

        let mut dir = tokio_fs::read_dir(self.root.join("meetings")).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path().join("meeting.json");
            if !path.exists() {
                continue;
            }
            let content = tokio_fs::read_to_string(&path).await?;
            let meeting: Meeting = serde_json::from_str(&content)?;
            self.codes.insert(meeting.id, meeting.meeting_code.clone());
            if meeting.id == meeting_id {
                return Ok(meeting.meeting_code);
            }
        }

        Err(AppError::MeetingNotFound)
    }

    async fn read_participants(&self, meeting_code: &str) -> Result<Vec<Participant>, AppError> {
        let path = self.meeting_dir(meeting_code).join("participants.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio_fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_participants(
        &self,
        meeting_code: &str,
        rows: &[Participant],
    ) -> Result<(), AppError> {
        let path = self.meeting_dir(meeting_code).join("participants.json");
        let json = serde_json::to_string_pretty(rows)?;
        tokio_fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for FlatFileStore {
    async fn find_by_code(&self, meeting_code: &str) -> Result<Option<Meeting>, AppError> {
        let path = self.meeting_dir(meeting_code).join("meeting.json");
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio_fs::read_to_string(&path).await?;
        let meeting: Meeting = serde_json::from_str(&content)?;
        self.codes.insert(meeting.id, meeting.meeting_code.clone());
        Ok(Some(meeting))
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> Result<(), AppError> {
        let dir = self.meeting_dir(&meeting.meeting_code);
        if dir.join("meeting.json").exists() {
            return Err(AppError::Storage(format!(
                "meeting code {} already exists",
                meeting.meeting_code
            )));
        }
        tokio_fs::create_dir_all(&dir).await?;

        let json = serde_json::to_string_pretty(meeting)?;
        tokio_fs::write(dir.join("meeting.json"), json).await?;

        self.codes.insert(meeting.id, meeting.meeting_code.clone());
        Ok(())
    }

    async fn upsert_participant(
        &self,
        meeting_id: Uuid,
        user_id: &str,
        role: MeetingRole,
        status: ParticipantStatus,
    ) -> Result<Participant, AppError> {
        let code = self.resolve_code(meeting_id).await?;
        let mut rows = self.read_participants(&code).await?;

        let row = match rows.iter_mut().find(|p| p.user_id == user_id) {
            Some(existing) => {
                existing.status = status;
                existing.left_at = None;
                existing.clone()
            },
            None => {
                let row = Participant {
                    meeting_id,
                    user_id: user_id.to_string(),
                    role,
                    status,
                    joined_at: Utc::now(),
                    left_at: None,
                };
                rows.push(row.clone());
                row
            },
        };

        self.write_participants(&code, &rows).await?;
        Ok(row)
    }

    async fn mark_left(&self, meeting_id: Uuid, user_id: &str) -> Result<(), AppError> {
        let code = self.resolve_code(meeting_id).await?;
        let mut rows = self.read_participants(&code).await?;

        if let Some(row) = rows.iter_mut().find(|p| p.user_id == user_id) {
            row.status = ParticipantStatus::Left;
            row.left_at = Some(Utc::now());
            self.write_participants(&code, &rows).await?;
        }

        Ok(())
    }

    async fn list_messages(&self, meeting_id: Uuid) -> Result<Vec<StoredMessage>, AppError> {
        let code = self.resolve_code(meeting_id).await?;
        let path = self.meeting_dir(&code).join("messages.log");
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = tokio_fs::read_to_string(&path).await?;
        let mut messages = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            messages.push(serde_json::from_str(line)?);
        }
        Ok(messages)
    }

    async fn save_message(
        &self,
        meeting_id: Uuid,
        sender_id: &str,
        content: &str,
    ) -> Result<StoredMessage, AppError> {
        let code = self.resolve_code(meeting_id).await?;
        let path = self.meeting_dir(&code).join("messages.log");

        let message = StoredMessage {
            id: Uuid::new_v4(),
            meeting_id,
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&message)?;
        let mut file = tokio_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;

        Ok(message)
    }
}
