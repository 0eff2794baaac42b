//! WebSocket connection handling

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::outbox::{self, OUTBOX_CAPACITY};

use super::protocol::{ClientMessage, ServerMessage};

type WsSender = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler. Refuses with 503 when the viewer limit is
/// already reached.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if state.hub.is_full().await {
        warn!(max = state.hub.max_clients(), "Refusing viewer: at capacity");
        return (StatusCode::SERVICE_UNAVAILABLE, "viewer limit reached").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one viewer session from connect to disconnect.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let id = Uuid::new_v4().to_string();
    let (outbox, mut outbox_rx) = outbox::channel(OUTBOX_CAPACITY);

    // Another viewer may have taken the last slot since the upgrade check.
    if let Err(e) = state.hub.connect(&id, outbox).await {
        warn!(client = %id, "Refusing viewer: {}", e);
        close(&mut sender, close_code::AGAIN, "viewer limit reached").await;
        return;
    }
    info!(client = %id, "WebSocket client connected");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                close(&mut sender, close_code::AWAY, "server shutting down").await;
                break;
            }
            outbound = outbox_rx.recv() => {
                let Some(payload) = outbound else { break };
                if sender.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_text_message(&text, &id, &state).await
                        && !send_json(&mut sender, &reply).await
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(client = %id, "WebSocket client sent close frame");
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {
                    // Ignore binary and pong messages
                }
                Some(Err(e)) => {
                    debug!(client = %id, "WebSocket error: {}", e);
                    break;
                }
            }
        }
    }

    state.hub.disconnect(&id).await;
    info!(client = %id, "WebSocket client disconnected");
}

/// Apply one inbound message. Returns a reply meant only for this session.
async fn handle_text_message(text: &str, id: &str, state: &AppState) -> Option<ServerMessage> {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(client = %id, "Ignoring malformed message: {}", e);
            return None;
        }
    };

    match msg {
        ClientMessage::UserJoined { username } => {
            state.hub.identify(id, username.as_deref()).await;
            None
        }
        ClientMessage::ChatMessage { username, message } => {
            state.hub.chat(username, message).await;
            None
        }
        ClientMessage::ToggleProcessing { enabled } => {
            state.hub.set_detection_enabled(enabled).await;
            None
        }
        ClientMessage::StartRecording => state.hub.start_recording().await,
        ClientMessage::StopRecording => state.hub.stop_recording().await,
    }
}

async fn send_json(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize reply: {}", e);
            true
        }
    }
}

async fn close(sender: &mut WsSender, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = sender.send(Message::Close(Some(frame))).await;
}
