// ============================
// huddle-backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection handling.
//!
//! One task per connection runs the read loop; a second forwards queued
//! server events onto the socket. The credential rides the upgrade request
//! (Authorization header or `token` query parameter) and is verified
//! before anything is registered. Cleanup runs exactly once when the read
//! loop ends, whatever ended it.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use huddle_common::{ClientEvent, ServerEvent};

use crate::auth;
use crate::handlers;
use crate::metrics::{WS_ACTIVE, WS_CONNECTIONS};
use crate::storage::MeetingStore;
use crate::AppState;

/// Capacity of the per-connection outbound queue
const OUTBOUND_QUEUE: usize = 32;

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Create the WebSocket router
pub fn create_router<S: MeetingStore + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for WebSocket connections
async fn ws_handler<S: MeetingStore + Clone + 'static>(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    // The explicit handshake credential wins over the header.
    let credential = query.token.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    });

    ws.on_upgrade(move |socket| handle_connection(socket, state, credential))
}

async fn handle_connection<S: MeetingStore + Clone + 'static>(
    socket: WebSocket,
    state: Arc<AppState<S>>,
    credential: Option<String>,
) {
    let (mut sink, mut stream) = socket.split();

    // Gate the connection before anything is registered. On failure the
    // client gets one socket:error and a hard close; there is no retry.
    let identity = match auth::authenticate(state.verifier.as_ref(), credential.as_deref()).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(%err, "rejecting unauthenticated connection");
            let event = ServerEvent::SocketError {
                message: "Unauthorized socket".to_string(),
            };
            if let Ok(json) = serde_json::to_string(&event) {
                let _ = sink.send(Message::Text(json.into())).await;
            }
            let _ = sink.close().await;
            return;
        },
    };

    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);
    state.registry.register(conn_id, identity.clone(), tx.clone());

    counter!(WS_CONNECTIONS).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);
    tracing::info!(%conn_id, user_id = %identity.user_id, "connection established");

    // Writer task: serialize queued server events onto the socket.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(%err, "failed to serialize server event");
                    continue;
                },
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Read loop: parse, validate, dispatch.
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        // Malformed frames are rejected without dropping
                        // the connection.
                        let _ = tx
                            .send(ServerEvent::SocketError {
                                message: format!("malformed event: {err}"),
                            })
                            .await;
                        continue;
                    },
                };

                if let Err(err) =
                    handlers::handle_event(&state, conn_id, &identity, &tx, event).await
                {
                    tracing::debug!(%conn_id, %err, "event rejected");
                    let _ = tx
                        .send(ServerEvent::SocketError {
                            message: err.to_string(),
                        })
                        .await;
                }
            },
            Message::Close(_) => break,
            // Pings are answered by the protocol layer; binary frames are
            // not part of the contract.
            _ => {},
        }
    }

    handlers::handle_disconnect(&state, conn_id).await;
    gauge!(WS_ACTIVE).decrement(1.0);
    tracing::info!(%conn_id, "connection closed");

    send_task.abort();
}
