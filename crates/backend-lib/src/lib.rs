// ============================
// huddle-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the huddle WebSocket server.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod handlers;
pub mod meetings;
pub mod metrics;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod storage;
pub mod validation;
pub mod ws_router;

use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::chat::ChatRelay;
use crate::presence::PresenceNotifier;
use crate::registry::ConnectionRegistry;
use crate::relay::SignalRelay;
use crate::rooms::RoomManager;
use crate::storage::MeetingStore;

/// Application state shared across all connections.
pub struct AppState<S> {
    /// Live-connection registry
    pub registry: Arc<ConnectionRegistry>,
    /// Ephemeral room membership
    pub rooms: Arc<RoomManager>,
    /// Broadcast helper
    pub presence: Arc<PresenceNotifier>,
    /// Point-to-point signaling relay
    pub relay: SignalRelay,
    /// Chat persistence + broadcast path
    pub chat: ChatRelay<S>,
    /// Durable meeting store
    pub store: S,
    /// Credential verifier, consulted once per connection
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl<S: MeetingStore + Clone + 'static> AppState<S> {
    /// Create a new application state
    pub fn new(store: S, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomManager::new());
        let presence = Arc::new(PresenceNotifier::new(registry.clone(), rooms.clone()));
        let relay = SignalRelay::new(registry.clone());
        let chat = ChatRelay::new(store.clone(), registry.clone(), presence.clone());

        Self {
            registry,
            rooms,
            presence,
            relay,
            chat,
            store,
            verifier,
        }
    }
}
