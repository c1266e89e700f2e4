use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use relay_shared::protocol::{ClientMsg, ServerMsg, SessionId};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::events::{EventHub, RelayEvent};
use crate::registry::SessionRegistry;
use crate::session::ClientSession;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub events: EventHub,
    pub broadcast_period: Duration,
    pub max_message_bytes: usize,
    pub max_name_len: usize,
    pub connection_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            events: EventHub::new(config.event_capacity),
            broadcast_period: config.broadcast_period(),
            max_message_bytes: config.max_message_bytes,
            max_name_len: config.max_name_len,
            connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        }
    }
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("connection limit reached, refusing upgrade");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    ws.max_message_size(app_state.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, app_state, permit))
        .into_response()
}

async fn handle_socket(socket: WebSocket, app_state: AppState, permit: OwnedSemaphorePermit) {
    let session_id = Uuid::new_v4();
    app_state.registry.insert(session_id, ClientSession::default());
    tracing::info!(
        "client {} connected ({} online)",
        session_id,
        app_state.registry.len()
    );

    run_session(socket, &app_state, session_id).await;

    // The one close path, whatever ended the session: deregister first so no
    // snapshot taken after the notice can still contain this id.
    app_state.registry.remove(session_id);
    app_state.events.publish(RelayEvent::Disconnected(session_id));
    tracing::info!(
        "client {} disconnected ({} online)",
        session_id,
        app_state.registry.len()
    );
    drop(permit);
}

async fn run_session(socket: WebSocket, app_state: &AppState, session_id: SessionId) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before anything can be missed.
    let mut events = app_state.events.subscribe();

    // The client must learn its own id before it can interpret snapshots.
    if send_msg(&mut sink, &ServerMsg::Uuid(session_id)).await.is_err() {
        return;
    }

    // Snapshot pushes start only after the identity message went out.
    let mut ticker = tokio::time::interval(app_state.broadcast_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut active = false;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(ClientMsg::Position(update)) => {
                                app_state.registry.apply_update(session_id, update);
                                if !active {
                                    active = true;
                                    tracing::debug!("client {} reported its first transform", session_id);
                                }
                            }
                            Ok(ClientMsg::Name(name)) => {
                                let name = truncate_name(&name, app_state.max_name_len);
                                app_state.registry.set_name(session_id, name);
                            }
                            Ok(ClientMsg::Unknown) => {
                                tracing::debug!("client {}: ignoring message with unknown type", session_id);
                            }
                            Err(e) => {
                                tracing::debug!("client {}: dropping malformed message: {}", session_id, e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("client {}: socket error: {}", session_id, e);
                        break;
                    }
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (full snapshot, own entry included)
            _ = ticker.tick() => {
                let snapshot = app_state.registry.snapshot();
                if send_msg(&mut sink, &ServerMsg::Position(snapshot)).await.is_err() {
                    break;
                }
            }

            // Peer lifecycle notices
            event = events.recv() => {
                match event {
                    Ok(RelayEvent::Disconnected(peer_id)) => {
                        if peer_id == session_id {
                            continue;
                        }
                        if send_msg(&mut sink, &ServerMsg::Disconnect(peer_id)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Peers it missed will vanish from upcoming snapshots.
                        tracing::warn!("client {} lagged by {} events", session_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap();
    sink.send(Message::Text(json.into())).await
}

/// Clamp a display name to `max_len` characters on a char boundary.
fn truncate_name(name: &str, max_len: usize) -> String {
    match name.char_indices().nth(max_len) {
        Some((idx, _)) => name[..idx].to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_name_respects_char_boundaries() {
        assert_eq!(truncate_name("Bob", 64), "Bob");
        assert_eq!(truncate_name("abcdef", 3), "abc");
        // Multi-byte chars count as one
        assert_eq!(truncate_name("åäö", 2), "åä");
    }
}
