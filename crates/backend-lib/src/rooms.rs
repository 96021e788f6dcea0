// ============================
// huddle-backend-lib/src/rooms.rs
// ============================
//! Room membership management.
//!
//! Rooms are the ephemeral membership sets of live connections per meeting
//! code. They are created lazily on first join and never destroyed; an
//! empty set is harmless. Mutations to one room are serialized through the
//! map's per-entry locking, so concurrent join/leave/disconnect on the
//! same room cannot lose updates. Nothing prevents a connection from being
//! in several rooms at once; callers pay the signaling fan-out for it.

use std::collections::HashSet;

use dashmap::DashMap;

use huddle_common::ConnectionId;

/// Membership sets for all active rooms
pub struct RoomManager {
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl RoomManager {
    pub fn new() -> Self {
        RoomManager {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to a room and snapshot the *other* members, both
    /// under the same entry guard. Re-joining is a no-op apart from the
    /// snapshot. The returned peer list never contains the joiner itself.
    pub fn join(&self, meeting_code: &str, conn_id: ConnectionId) -> Vec<ConnectionId> {
        let mut members = self.rooms.entry(meeting_code.to_string()).or_default();
        members.insert(conn_id);
        members.iter().copied().filter(|m| *m != conn_id).collect()
    }

    /// Remove a connection from a room. Idempotent; returns whether the
    /// connection was actually a member.
    pub fn leave(&self, meeting_code: &str, conn_id: ConnectionId) -> bool {
        self.rooms
            .get_mut(meeting_code)
            .map(|mut members| members.remove(&conn_id))
            .unwrap_or(false)
    }

    /// Snapshot of a room's current members
    pub fn members(&self, meeting_code: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(meeting_code)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, meeting_code: &str, conn_id: ConnectionId) -> bool {
        self.rooms
            .get(meeting_code)
            .map(|members| members.contains(&conn_id))
            .unwrap_or(false)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
