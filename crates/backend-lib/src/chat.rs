// ============================
// huddle-backend-lib/src/chat.rs
// ============================
//! Chat relay: persist a message, then broadcast it to the room.
//!
//! Persistence (or its skip) strictly precedes the broadcast for a single
//! message. There is no total order across concurrent senders: two sends
//! racing against the store may interleave, and whichever completes first
//! is delivered first. The send itself is fire-and-forget; store failures
//! downgrade the message to an unpersisted broadcast instead of failing
//! the operation.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use uuid::Uuid;

use huddle_common::{ChatSender, ConnectionId, ServerEvent, StoredMessage};

use crate::auth::Identity;
use crate::metrics::{CHAT_EPHEMERAL, CHAT_PERSISTED};
use crate::presence::PresenceNotifier;
use crate::registry::ConnectionRegistry;
use crate::storage::MeetingStore;

pub struct ChatRelay<S> {
    store: S,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceNotifier>,
}

impl<S: MeetingStore> ChatRelay<S> {
    pub fn new(
        store: S,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceNotifier>,
    ) -> Self {
        ChatRelay {
            store,
            registry,
            presence,
        }
    }

    /// Relay one chat message to a room. Whitespace-only content is a
    /// silent no-op: nothing is persisted, nothing is broadcast. The
    /// sender identity comes from the live connection, never from the
    /// payload.
    pub async fn send(&self, meeting_code: &str, sender_conn: ConnectionId, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }

        // The connection can vanish between dispatch and here; a message
        // without a live sender has nowhere to draw its identity from.
        let Some(identity) = self.registry.lookup(sender_conn) else {
            return;
        };

        let stored = self.persist(meeting_code, &identity, content).await;

        let event = match stored {
            Some(row) => ServerEvent::ChatMessage {
                id: row.id,
                content: row.content,
                sender: ChatSender {
                    id: identity.user_id.clone(),
                    name: identity.display_hint.clone(),
                },
                created_at: row.created_at,
            },
            // Unknown meeting or failed write: synthesize an ephemeral
            // message rather than failing the whole send.
            None => {
                counter!(CHAT_EPHEMERAL).increment(1);
                ServerEvent::ChatMessage {
                    id: Uuid::new_v4(),
                    content: content.to_string(),
                    sender: ChatSender {
                        id: identity.user_id.clone(),
                        name: identity.display_hint.clone(),
                    },
                    created_at: Utc::now(),
                }
            },
        };

        // Everyone in the room sees the message, the sender included.
        self.presence.announce_room(meeting_code, event, None).await;
    }

    async fn persist(
        &self,
        meeting_code: &str,
        identity: &Identity,
        content: &str,
    ) -> Option<StoredMessage> {
        let meeting = match self.store.find_by_code(meeting_code).await {
            Ok(Some(meeting)) => meeting,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%meeting_code, %err, "meeting lookup failed, broadcasting unpersisted");
                return None;
            },
        };

        match self
            .store
            .save_message(meeting.id, &identity.user_id, content)
            .await
        {
            Ok(row) => {
                counter!(CHAT_PERSISTED).increment(1);
                Some(row)
            },
            Err(err) => {
                tracing::warn!(%meeting_code, %err, "chat persistence failed, broadcasting unpersisted");
                None
            },
        }
    }
}
