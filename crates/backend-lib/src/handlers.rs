// ============================
// huddle-backend-lib/src/handlers.rs
// ============================
//! Per-event dispatch for authenticated connections.
//!
//! Every handler runs in the connection's own task. Request/response-style
//! failures (unknown meeting on join/leave, store errors) bubble up as
//! `AppError` and are surfaced to the caller as `socket:error`; the
//! fire-and-forget paths (signaling, chat) never fail the connection.

use metrics::counter;
use tokio::sync::mpsc;

use huddle_common::{ClientEvent, ConnectionId, PeerInfo, ServerEvent};

use crate::auth::Identity;
use crate::error::AppError;
use crate::meetings;
use crate::metrics::{ROOM_JOINED, ROOM_LEFT};
use crate::relay::SignalKind;
use crate::storage::MeetingStore;
use crate::validation;
use crate::AppState;

/// Handle one client event
pub async fn handle_event<S: MeetingStore + Clone + 'static>(
    state: &AppState<S>,
    conn_id: ConnectionId,
    identity: &Identity,
    sender: &mpsc::Sender<ServerEvent>,
    event: ClientEvent,
) -> Result<(), AppError> {
    validation::validate_client_event(&event)?;

    match event {
        ClientEvent::MeetingJoin { meeting_code, name } => {
            // Durable state first: an unknown meeting or a failed upsert
            // surfaces to the caller without touching membership.
            meetings::join_meeting(&state.store, &meeting_code, &identity.user_id).await?;

            let peers = state.rooms.join(&meeting_code, conn_id);
            state.registry.track_room(conn_id, &meeting_code);
            counter!(ROOM_JOINED).increment(1);
            tracing::info!(%conn_id, %meeting_code, peer_count = peers.len(), "joined room");

            // The join broadcast and the peer-list reply are independent;
            // no ordering between them is promised across the transport.
            state
                .presence
                .announce_to(
                    &peers,
                    ServerEvent::ParticipantJoined {
                        connection_id: conn_id,
                        user_id: identity.user_id.clone(),
                        name,
                    },
                )
                .await;

            let peers = peers
                .into_iter()
                .map(|connection_id| PeerInfo { connection_id })
                .collect();
            sender.send(ServerEvent::MeetingPeers { peers }).await?;
            Ok(())
        },

        ClientEvent::MeetingLeave { meeting_code } => {
            let was_member = state.rooms.leave(&meeting_code, conn_id);
            state.registry.untrack_room(conn_id, &meeting_code);

            meetings::leave_meeting(&state.store, &meeting_code, &identity.user_id).await?;

            if was_member {
                counter!(ROOM_LEFT).increment(1);
                tracing::info!(%conn_id, %meeting_code, "left room");
                state
                    .presence
                    .announce_room(
                        &meeting_code,
                        ServerEvent::ParticipantLeft {
                            connection_id: conn_id,
                            user_id: identity.user_id.clone(),
                        },
                        Some(conn_id),
                    )
                    .await;
            }
            Ok(())
        },

        ClientEvent::WebrtcOffer {
            meeting_code,
            target_connection_id,
            offer,
        } => {
            state
                .relay
                .relay(
                    SignalKind::Offer { meeting_code },
                    conn_id,
                    target_connection_id,
                    offer,
                )
                .await;
            Ok(())
        },

        ClientEvent::WebrtcAnswer {
            target_connection_id,
            answer,
        } => {
            state
                .relay
                .relay(SignalKind::Answer, conn_id, target_connection_id, answer)
                .await;
            Ok(())
        },

        ClientEvent::WebrtcIceCandidate {
            target_connection_id,
            candidate,
        } => {
            state
                .relay
                .relay(
                    SignalKind::IceCandidate,
                    conn_id,
                    target_connection_id,
                    candidate,
                )
                .await;
            Ok(())
        },

        ClientEvent::ChatMessage {
            meeting_code,
            content,
        } => {
            state.chat.send(&meeting_code, conn_id, &content).await;
            Ok(())
        },

        ClientEvent::ParticipantState {
            meeting_code,
            state_type,
            value,
        } => {
            state
                .presence
                .announce_room(
                    &meeting_code,
                    ServerEvent::ParticipantState {
                        connection_id: conn_id,
                        user_id: identity.user_id.clone(),
                        state_type,
                        value,
                    },
                    Some(conn_id),
                )
                .await;
            Ok(())
        },
    }
}

/// Disconnect cleanup. Runs exactly once, after the read loop ends, in the
/// connection's own task; any later event for this id observes the
/// connection as gone. The "left" broadcast is scoped to exactly the rooms
/// the connection was a member of.
pub async fn handle_disconnect<S: MeetingStore + Clone + 'static>(
    state: &AppState<S>,
    conn_id: ConnectionId,
) {
    let Some(connection) = state.registry.remove(conn_id) else {
        return;
    };

    for meeting_code in &connection.rooms {
        if state.rooms.leave(meeting_code, conn_id) {
            counter!(ROOM_LEFT).increment(1);
            state
                .presence
                .announce_room(
                    meeting_code,
                    ServerEvent::ParticipantLeft {
                        connection_id: conn_id,
                        user_id: connection.identity.user_id.clone(),
                    },
                    None,
                )
                .await;
        }
    }

    tracing::info!(%conn_id, rooms = connection.rooms.len(), "connection cleaned up");
}
