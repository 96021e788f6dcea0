// ===========================
// crates/backend-lib/tests/ws_flow.rs
// ===========================
//! End-to-end WebSocket flow: two clients joining a meeting, exchanging
//! signaling and chat, and observing each other's presence.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use huddle_backend_lib::{
    auth::{Claims, IdentityVerifier, JwtVerifier},
    meetings,
    storage::FlatFileStore,
    ws_router, AppState,
};

const SECRET: &str = "test-secret";

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn token_for(user_id: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn spawn_server(store: FlatFileStore) -> String {
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(SECRET));
    let state = Arc::new(AppState::new(store, verifier));
    let app = ws_router::create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("ws://{addr}/ws")
}

async fn connect(url: &str, user_id: &str) -> WsClient {
    let (socket, _) = connect_async(format!("{url}?token={}", token_for(user_id)))
        .await
        .unwrap();
    socket
}

async fn send_event(socket: &mut WsClient, event: Value) {
    socket
        .send(Message::Text(event.to_string().into()))
        .await
        .unwrap();
}

async fn next_event(socket: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended unexpectedly")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Assert that no event arrives within a short grace window
async fn assert_silent(socket: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

#[tokio::test]
async fn test_full_meeting_flow() {
    let temp_dir = TempDir::new().unwrap();
    let store = FlatFileStore::new(temp_dir.path()).unwrap();
    let meeting = meetings::create_meeting(&store, "host-user", Some("Standup".to_string()))
        .await
        .unwrap();
    let code = meeting.meeting_code.clone();

    let url = spawn_server(store.clone()).await;

    // A joins first and sees an empty room.
    let mut a = connect(&url, "host-user").await;
    send_event(
        &mut a,
        json!({"event": "meeting:join", "data": {"meetingCode": code, "name": "Alice"}}),
    )
    .await;

    let peers = next_event(&mut a).await;
    assert_eq!(peers["event"], "meeting:peers");
    assert_eq!(peers["data"]["peers"], json!([]));

    // B joins next: B's snapshot is exactly [A], and A hears about B.
    let mut b = connect(&url, "guest-user").await;
    send_event(
        &mut b,
        json!({"event": "meeting:join", "data": {"meetingCode": code, "name": "Bob"}}),
    )
    .await;

    let peers = next_event(&mut b).await;
    assert_eq!(peers["event"], "meeting:peers");
    let peer_list = peers["data"]["peers"].as_array().unwrap();
    assert_eq!(peer_list.len(), 1);
    let a_id = peer_list[0]["connectionId"].as_str().unwrap().to_string();

    let joined = next_event(&mut a).await;
    assert_eq!(joined["event"], "participant:joined");
    assert_eq!(joined["data"]["userId"], "guest-user");
    assert_eq!(joined["data"]["name"], "Bob");
    let b_id = joined["data"]["connectionId"]
        .as_str()
        .unwrap()
        .to_string();

    // A offers to B; B receives it tagged with A's connection id.
    send_event(
        &mut a,
        json!({"event": "webrtc:offer", "data": {
            "meetingCode": code,
            "targetConnectionId": b_id,
            "offer": {"type": "offer", "sdp": "v=0..."}
        }}),
    )
    .await;

    let offer = next_event(&mut b).await;
    assert_eq!(offer["event"], "webrtc:offer");
    assert_eq!(offer["data"]["fromConnectionId"], a_id);
    assert_eq!(offer["data"]["offer"]["sdp"], "v=0...");
    assert_eq!(offer["data"]["meetingCode"], code.as_str());

    // B answers back.
    send_event(
        &mut b,
        json!({"event": "webrtc:answer", "data": {
            "targetConnectionId": a_id,
            "answer": {"type": "answer", "sdp": "v=0..."}
        }}),
    )
    .await;

    let answer = next_event(&mut a).await;
    assert_eq!(answer["event"], "webrtc:answer");
    assert_eq!(answer["data"]["fromConnectionId"], b_id);

    // A chats; both members receive the persisted message.
    send_event(
        &mut a,
        json!({"event": "chat:message", "data": {"meetingCode": code, "content": "hello"}}),
    )
    .await;

    let chat_a = next_event(&mut a).await;
    let chat_b = next_event(&mut b).await;
    for chat in [&chat_a, &chat_b] {
        assert_eq!(chat["event"], "chat:message");
        assert_eq!(chat["data"]["content"], "hello");
        assert_eq!(chat["data"]["sender"]["id"], "host-user");
    }
    assert_eq!(chat_a["data"]["id"], chat_b["data"]["id"]);

    // Persist-then-broadcast: by the time the event arrived, the row is
    // visible through the listing interface with the same content.
    let messages = meetings::list_messages(&store, &code).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[0].sender_id, "host-user");
    assert_eq!(messages[0].id.to_string(), chat_a["data"]["id"]);

    // A mute state change reaches B but not A.
    send_event(
        &mut a,
        json!({"event": "participant:state", "data": {"meetingCode": code, "type": "mute", "value": true}}),
    )
    .await;

    let state_event = next_event(&mut b).await;
    assert_eq!(state_event["event"], "participant:state");
    assert_eq!(state_event["data"]["connectionId"], a_id);
    assert_eq!(state_event["data"]["type"], "mute");
    assert_eq!(state_event["data"]["value"], json!(true));

    // Whitespace-only chat: no broadcast, no persisted row.
    send_event(
        &mut a,
        json!({"event": "chat:message", "data": {"meetingCode": code, "content": "   "}}),
    )
    .await;
    assert_silent(&mut a).await;
    assert_eq!(meetings::list_messages(&store, &code).await.unwrap().len(), 1);

    // Signaling a connection that does not exist is silently dropped.
    send_event(
        &mut a,
        json!({"event": "webrtc:ice-candidate", "data": {
            "targetConnectionId": uuid::Uuid::new_v4(),
            "candidate": {"candidate": "candidate:0 1 UDP"}
        }}),
    )
    .await;
    assert_silent(&mut a).await;

    // B disconnects; A is told B left.
    b.close(None).await.unwrap();

    let left = next_event(&mut a).await;
    assert_eq!(left["event"], "participant:left");
    assert_eq!(left["data"]["connectionId"], b_id);
    assert_eq!(left["data"]["userId"], "guest-user");
}

#[tokio::test]
async fn test_join_unknown_meeting_yields_socket_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = FlatFileStore::new(temp_dir.path()).unwrap();
    let url = spawn_server(store).await;

    let mut a = connect(&url, "user-1").await;
    send_event(
        &mut a,
        json!({"event": "meeting:join", "data": {"meetingCode": "ABCD-EFGH-JKLM", "name": "Alice"}}),
    )
    .await;

    let event = next_event(&mut a).await;
    assert_eq!(event["event"], "socket:error");

    // The connection survives the error and stays usable.
    send_event(&mut a, json!({"event": "not-a-real-event", "data": {}})).await;
    let event = next_event(&mut a).await;
    assert_eq!(event["event"], "socket:error");
}

#[tokio::test]
async fn test_unauthenticated_connection_is_closed() {
    let temp_dir = TempDir::new().unwrap();
    let store = FlatFileStore::new(temp_dir.path()).unwrap();
    let url = spawn_server(store).await;

    // No token at all.
    let (mut socket, _) = connect_async(url.clone()).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("websocket error");
    let event: Value = match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected text frame, got {other:?}"),
    };
    assert_eq!(event["event"], "socket:error");
    assert_eq!(event["data"]["message"], "Unauthorized socket");

    // The server hard-closes after the error.
    loop {
        match tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for close")
        {
            None => break,
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        }
    }

    // A garbage token is rejected the same way.
    let (mut socket, _) = connect_async(format!("{url}?token=garbage")).await.unwrap();
    let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("websocket error");
    if let Message::Text(text) = msg {
        let event: Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(event["event"], "socket:error");
    } else {
        panic!("Expected text frame");
    }
}
