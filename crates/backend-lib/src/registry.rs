// ============================
// huddle-backend-lib/src/registry.rs
// ============================
//! Live-connection registry.
//!
//! Process-wide map from connection id to identity and outbound channel.
//! An entry lives exactly as long as the underlying connection; it is
//! mutated only from that connection's own task, so removal stays
//! reachable from the disconnect path even when handlers are in flight.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;

use huddle_common::{ConnectionId, ServerEvent};

use crate::auth::Identity;

/// One live connection as the registry sees it.
#[derive(Clone)]
pub struct Connection {
    pub identity: Identity,
    pub sender: mpsc::Sender<ServerEvent>,
    /// Rooms this connection currently belongs to, kept so the disconnect
    /// broadcast can be scoped to exactly these rooms.
    pub rooms: HashSet<String>,
}

/// Registry of all live connections
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            connections: DashMap::new(),
        }
    }

    /// Record a freshly authenticated connection
    pub fn register(
        &self,
        id: ConnectionId,
        identity: Identity,
        sender: mpsc::Sender<ServerEvent>,
    ) {
        self.connections.insert(
            id,
            Connection {
                identity,
                sender,
                rooms: HashSet::new(),
            },
        );
    }

    /// Look up the identity behind a connection id
    pub fn lookup(&self, id: ConnectionId) -> Option<Identity> {
        self.connections.get(&id).map(|c| c.identity.clone())
    }

    /// Outbound channel for a connection, if it is still live
    pub fn sender(&self, id: ConnectionId) -> Option<mpsc::Sender<ServerEvent>> {
        self.connections.get(&id).map(|c| c.sender.clone())
    }

    /// Remember that a connection joined a room
    pub fn track_room(&self, id: ConnectionId, meeting_code: &str) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.rooms.insert(meeting_code.to_string());
        }
    }

    /// Forget a room after an explicit leave
    pub fn untrack_room(&self, id: ConnectionId, meeting_code: &str) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.rooms.remove(meeting_code);
        }
    }

    /// Remove a connection. Idempotent: unknown ids and repeated calls are
    /// no-ops. Returns the final entry so the caller can scope its
    /// disconnect broadcast to the rooms the connection was in.
    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(user: &str) -> Identity {
        Identity {
            user_id: user.to_string(),
            display_hint: format!("{user}@example.com"),
        }
    }

    fn channel() -> mpsc::Sender<ServerEvent> {
        mpsc::channel(8).0
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();

        registry.register(id, identity("user-1"), channel());

        let found = registry.lookup(id).unwrap();
        assert_eq!(found.user_id, "user-1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.lookup(Uuid::new_v4()).is_none());
        assert!(registry.sender(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id, identity("user-1"), channel());

        assert!(registry.remove(id).is_some());
        // Second removal and removal of an unknown id are both no-ops.
        assert!(registry.remove(id).is_none());
        assert!(registry.remove(Uuid::new_v4()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_room_tracking() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id, identity("user-1"), channel());

        registry.track_room(id, "AAAA-BBBB-CCCC");
        registry.track_room(id, "DDDD-EEEE-FFFF");
        registry.track_room(id, "AAAA-BBBB-CCCC");
        registry.untrack_room(id, "DDDD-EEEE-FFFF");

        let conn = registry.remove(id).unwrap();
        assert_eq!(conn.rooms.len(), 1);
        assert!(conn.rooms.contains("AAAA-BBBB-CCCC"));
    }

    #[test]
    fn test_track_room_on_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.track_room(Uuid::new_v4(), "AAAA-BBBB-CCCC");
        assert!(registry.is_empty());
    }
}
