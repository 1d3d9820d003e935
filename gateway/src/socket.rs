//! Event socket (§6): pushes `Event`s as JSON text frames to every connected
//! subscriber. Auth happens at handshake via an `auth` field on the first
//! text frame the client sends, rather than a header (browsers cannot set
//! `Authorization` on a WebSocket upgrade request).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

use crate::app::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
struct HandshakeFrame {
    auth: String,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let authed = match wait_for_auth(&mut socket).await {
        Some(key) if key == state.api_key => true,
        _ => false,
    };
    if !authed {
        let _ = socket.send(Message::Text("{\"error\":\"AUTH_ERROR\"}".to_string())).await;
        let _ = socket.close().await;
        return;
    }

    // Subscribe before reading the snapshot so no event published in between
    // is missed.
    let mut subscriber = state.event_bus.subscribe();
    if !send_snapshot(&mut socket, state.event_bus.snapshot()).await {
        return;
    }

    loop {
        tokio::select! {
            event = subscriber.next() => {
                match event {
                    Some(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(_) => continue,
                        };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

/// Seeds a freshly attached subscriber with the current coalesced
/// current-value cell (status/voice_state/voice_level/frame) plus the bounded
/// thought/action/chat history, so a client attaching mid-session sees state
/// immediately instead of waiting for the next live event.
async fn send_snapshot(socket: &mut WebSocket, snapshot: vla_core::CoalescedSnapshot) -> bool {
    let current = [snapshot.status, snapshot.voice_state, snapshot.voice_level, snapshot.frame];
    for event in current.into_iter().flatten() {
        if !send_event(socket, &event).await {
            return false;
        }
    }
    for event in snapshot
        .thoughts
        .iter()
        .chain(snapshot.actions.iter())
        .chain(snapshot.chat_messages.iter())
    {
        if !send_event(socket, event).await {
            return false;
        }
    }
    true
}

async fn send_event(socket: &mut WebSocket, event: &vla_stream_event::Event) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(_) => return true,
    };
    socket.send(Message::Text(json)).await.is_ok()
}

/// Reads frames until a well-formed `{"auth": "..."}` handshake arrives or a
/// short grace period elapses.
async fn wait_for_auth(socket: &mut WebSocket) -> Option<String> {
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return None,
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<HandshakeFrame>(&text) {
                            return Some(frame.auth);
                        }
                    }
                    Some(Ok(_)) => continue,
                    _ => return None,
                }
            }
        }
    }
}
