// ================
// crates/common/src/lib.rs
// ================
//! Shared types for the huddle meeting coordinator.
//! This crate defines the WebSocket wire protocol between clients and the
//! server, plus the durable-store records both sides of the backend share.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier of one live connection. One user may hold several at once.
pub type ConnectionId = Uuid;

/// Events received from clients over the WebSocket.
///
/// Wire format is `{"event": "<name>", "data": {...}}` with camelCase
/// payload fields. Signaling payloads (`offer`, `answer`, `candidate`)
/// are opaque JSON blobs; the server relays them without interpretation.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "meeting:join", rename_all = "camelCase")]
    MeetingJoin { meeting_code: String, name: String },
    #[serde(rename = "meeting:leave", rename_all = "camelCase")]
    MeetingLeave { meeting_code: String },
    #[serde(rename = "webrtc:offer", rename_all = "camelCase")]
    WebrtcOffer {
        meeting_code: String,
        target_connection_id: ConnectionId,
        offer: Value,
    },
    #[serde(rename = "webrtc:answer", rename_all = "camelCase")]
    WebrtcAnswer {
        target_connection_id: ConnectionId,
        answer: Value,
    },
    #[serde(rename = "webrtc:ice-candidate", rename_all = "camelCase")]
    WebrtcIceCandidate {
        target_connection_id: ConnectionId,
        candidate: Value,
    },
    #[serde(rename = "chat:message", rename_all = "camelCase")]
    ChatMessage { meeting_code: String, content: String },
    #[serde(rename = "participant:state", rename_all = "camelCase")]
    ParticipantState {
        meeting_code: String,
        #[serde(rename = "type")]
        state_type: String,
        value: Value,
    },
}

/// Events emitted by the server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Reply to the joiner: the other members present at join time.
    #[serde(rename = "meeting:peers", rename_all = "camelCase")]
    MeetingPeers { peers: Vec<PeerInfo> },
    #[serde(rename = "participant:joined", rename_all = "camelCase")]
    ParticipantJoined {
        connection_id: ConnectionId,
        user_id: String,
        name: String,
    },
    /// Offers carry the meeting code so the callee can answer in context.
    #[serde(rename = "webrtc:offer", rename_all = "camelCase")]
    WebrtcOffer {
        from_connection_id: ConnectionId,
        offer: Value,
        meeting_code: String,
    },
    #[serde(rename = "webrtc:answer", rename_all = "camelCase")]
    WebrtcAnswer {
        from_connection_id: ConnectionId,
        answer: Value,
    },
    #[serde(rename = "webrtc:ice-candidate", rename_all = "camelCase")]
    WebrtcIceCandidate {
        from_connection_id: ConnectionId,
        candidate: Value,
    },
    #[serde(rename = "chat:message", rename_all = "camelCase")]
    ChatMessage {
        id: Uuid,
        content: String,
        sender: ChatSender,
        created_at: DateTime<Utc>,
    },
    #[serde(rename = "participant:state", rename_all = "camelCase")]
    ParticipantState {
        connection_id: ConnectionId,
        user_id: String,
        #[serde(rename = "type")]
        state_type: String,
        value: Value,
    },
    #[serde(rename = "participant:left", rename_all = "camelCase")]
    ParticipantLeft {
        connection_id: ConnectionId,
        user_id: String,
    },
    #[serde(rename = "socket:error", rename_all = "camelCase")]
    SocketError { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub connection_id: ConnectionId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatSender {
    pub id: String,
    pub name: String,
}

/// A meeting as the durable store records it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: Uuid,
    pub meeting_code: String,
    pub host_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingRole {
    Host,
    Participant,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    Joined,
    Left,
}

/// Durable audit row, one per (meeting, user) pair. Distinct from the
/// ephemeral room membership set and free to diverge from it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub meeting_id: Uuid,
    pub user_id: String,
    pub role: MeetingRole,
    pub status: ParticipantStatus,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// A persisted chat message, listed in creation order.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_deserialization() {
        let raw = r#"{
            "event": "meeting:join",
            "data": { "meetingCode": "ABCD-EFGH-JKLM", "name": "Alice" }
        }"#;

        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::MeetingJoin { meeting_code, name } => {
                assert_eq!(meeting_code, "ABCD-EFGH-JKLM");
                assert_eq!(name, "Alice");
            },
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_signal_payload_stays_opaque() {
        let target = Uuid::new_v4();
        let raw = format!(
            r#"{{
                "event": "webrtc:offer",
                "data": {{
                    "meetingCode": "ABCD-EFGH-JKLM",
                    "targetConnectionId": "{target}",
                    "offer": {{ "type": "offer", "sdp": "v=0...", "extra": [1, 2] }}
                }}
            }}"#
        );

        let event: ClientEvent = serde_json::from_str(&raw).unwrap();
        match event {
            ClientEvent::WebrtcOffer {
                target_connection_id,
                offer,
                ..
            } => {
                assert_eq!(target_connection_id, target);
                // Arbitrary structure survives untouched.
                assert_eq!(offer["extra"], json!([1, 2]));
            },
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_server_event_serialization() {
        let conn = Uuid::new_v4();
        let event = ServerEvent::ParticipantLeft {
            connection_id: conn,
            user_id: "user-1".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "participant:left");
        assert_eq!(json["data"]["connectionId"], conn.to_string());
        assert_eq!(json["data"]["userId"], "user-1");
    }

    #[test]
    fn test_participant_state_type_field() {
        let raw = r#"{
            "event": "participant:state",
            "data": { "meetingCode": "ABCD-EFGH-JKLM", "type": "mute", "value": true }
        }"#;

        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::ParticipantState {
                state_type, value, ..
            } => {
                assert_eq!(state_type, "mute");
                assert_eq!(value, json!(true));
            },
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_chat_message_shape() {
        let event = ServerEvent::ChatMessage {
            id: Uuid::new_v4(),
            content: "hello".to_string(),
            sender: ChatSender {
                id: "user-1".to_string(),
                name: "alice@example.com".to_string(),
            },
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chat:message");
        assert_eq!(json["data"]["content"], "hello");
        assert_eq!(json["data"]["sender"]["id"], "user-1");
        assert!(json["data"]["createdAt"].is_string());
    }

    #[test]
    fn test_participant_status_roundtrip() {
        let row = Participant {
            meeting_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            role: MeetingRole::Host,
            status: ParticipantStatus::Joined,
            joined_at: Utc::now(),
            left_at: None,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["role"], "HOST");
        assert_eq!(json["status"], "JOINED");

        let back: Participant = serde_json::from_value(json).unwrap();
        assert_eq!(back.role, MeetingRole::Host);
        assert_eq!(back.status, ParticipantStatus::Joined);
    }
}
