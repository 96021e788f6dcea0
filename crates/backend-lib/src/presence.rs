// ============================
// huddle-backend-lib/src/presence.rs
// ============================
//! Presence broadcasting.
//!
//! Stateless fan-out helper over the registry's outbound channels.
//! Delivery is at-most-once: a closed or missing channel drops the event.

use std::sync::Arc;

use huddle_common::{ConnectionId, ServerEvent};

use crate::registry::ConnectionRegistry;
use crate::rooms::RoomManager;

pub struct PresenceNotifier {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
}

impl PresenceNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomManager>) -> Self {
        PresenceNotifier { registry, rooms }
    }

    /// Fan an event out to every current member of a room, optionally
    /// excluding one connection (typically the originator).
    pub async fn announce_room(
        &self,
        meeting_code: &str,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        // Snapshot before awaiting so no room lock is held across sends.
        let members = self.rooms.members(meeting_code);
        for member in members {
            if Some(member) == exclude {
                continue;
            }
            self.send(member, event.clone()).await;
        }
    }

    /// Fan an event out to an explicit set of connections
    pub async fn announce_to(&self, targets: &[ConnectionId], event: ServerEvent) {
        for target in targets {
            self.send(*target, event.clone()).await;
        }
    }

    async fn send(&self, target: ConnectionId, event: ServerEvent) {
        if let Some(tx) = self.registry.sender(target) {
            if tx.send(event).await.is_err() {
                tracing::debug!(%target, "dropping event for closed connection");
            }
        }
    }
}
