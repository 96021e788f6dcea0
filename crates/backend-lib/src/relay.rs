// ============================
// huddle-backend-lib/src/relay.rs
// ============================
//! Point-to-point signaling relay.
//!
//! Forwards opaque WebRTC handshake payloads between two live connections.
//! The payload is never inspected or validated here; session-description
//! semantics belong to the browsers on either end. Delivery is
//! at-most-once, fire-and-forget: no acknowledgment, no retry, no queue.
//! A target with no live connection means the message is silently dropped.
//!
//! The per-call cost is O(1); establishing a full mesh when joining a room
//! of size n still takes O(n) offer/answer/ICE exchanges, driven by the
//! clients.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;

use huddle_common::{ConnectionId, ServerEvent};

use crate::metrics::{SIGNAL_DROPPED, SIGNAL_RELAYED};
use crate::registry::ConnectionRegistry;

/// Handshake message kinds the relay forwards
pub enum SignalKind {
    /// Offers carry the meeting code through to the callee
    Offer { meeting_code: String },
    Answer,
    IceCandidate,
}

pub struct SignalRelay {
    registry: Arc<ConnectionRegistry>,
}

impl SignalRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        SignalRelay { registry }
    }

    /// Forward `payload` verbatim to `target`, tagged with the source
    /// connection id.
    pub async fn relay(
        &self,
        kind: SignalKind,
        source: ConnectionId,
        target: ConnectionId,
        payload: Value,
    ) {
        let event = match kind {
            SignalKind::Offer { meeting_code } => ServerEvent::WebrtcOffer {
                from_connection_id: source,
                offer: payload,
                meeting_code,
            },
            SignalKind::Answer => ServerEvent::WebrtcAnswer {
                from_connection_id: source,
                answer: payload,
            },
            SignalKind::IceCandidate => ServerEvent::WebrtcIceCandidate {
                from_connection_id: source,
                candidate: payload,
            },
        };

        match self.registry.sender(target) {
            Some(tx) => {
                if tx.send(event).await.is_ok() {
                    counter!(SIGNAL_RELAYED).increment(1);
                } else {
                    counter!(SIGNAL_DROPPED).increment(1);
                    tracing::debug!(%target, "signal target channel closed, dropping");
                }
            },
            None => {
                counter!(SIGNAL_DROPPED).increment(1);
                tracing::debug!(%target, "signal target not connected, dropping");
            },
        }
    }
}
