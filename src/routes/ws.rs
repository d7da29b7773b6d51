//! WebSocket handler — session loop and message dispatch.
//!
//! DESIGN
//! ======
//! On upgrade, each connection becomes a `Session` and enters a `select!`
//! loop:
//! - Inbound client messages → validate + dispatch to room operations
//! - Outbound queue (filled by rooms) → forward to the socket
//!
//! Rooms broadcast through member queues, so the dispatcher only ever
//! returns messages addressed to the sender (the join snapshot). Malformed
//! traffic is dropped and counted; sustained abuse disconnects the session.
//! A closed outbound queue means a room evicted this session (slow reader)
//! or the room was deleted — either way the connection ends.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (optional `?identity=` — the opaque handle minted by the
//!    auth collaborator; absent is anonymous)
//! 2. Messages dispatch to room ops; ordering per session is arrival order
//! 3. Close / error / eviction → leave the current room

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use tracing::{debug, info, warn};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::services::registry;
use crate::services::room::{JoinOutcome, Room};
use crate::session::Session;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = params.get("identity").cloned();
    ws.on_upgrade(move |socket| run_ws(socket, state, identity))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, identity: Option<String>) {
    let (mut session, mut outbound) = Session::new(identity, state.config.outbound_queue);
    state.connections.fetch_add(1, Ordering::Relaxed);
    info!(
        session_id = %session.id,
        identity = session.identity.as_deref().unwrap_or("anonymous"),
        "ws: session connected"
    );

    loop {
        let mut disconnect = false;
        tokio::select! {
            inbound = socket.recv() => {
                let Some(Ok(message)) = inbound else { break };
                match message {
                    Message::Text(text) => {
                        match process_inbound_text(&state, &mut session, text.as_str()).await {
                            Ok(replies) => {
                                for reply in replies {
                                    if send_message(&mut socket, &session, &reply).await.is_err() {
                                        disconnect = true;
                                        break;
                                    }
                                }
                            }
                            Err(Disconnect) => disconnect = true,
                        }
                    }
                    Message::Close(_) => disconnect = true,
                    _ => {}
                }
            }
            queued = outbound.recv() => {
                match queued {
                    Some(message) => {
                        if send_message(&mut socket, &session, &message).await.is_err() {
                            disconnect = true;
                        }
                    }
                    None => {
                        // Every sender dropped: the room shed this session.
                        info!(session_id = %session.id, "ws: outbound queue closed by room");
                        disconnect = true;
                    }
                }
            }
        }
        if disconnect {
            break;
        }
    }

    if let Some(room_id) = session.current_room.take() {
        registry::release(&state, &room_id, session.id).await;
    }
    state.rate_limiter.forget(session.id);
    state.connections.fetch_sub(1, Ordering::Relaxed);
    info!(session_id = %session.id, "ws: session disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// The session must be dropped (rate limit tripped).
#[derive(Debug)]
pub(crate) struct Disconnect;

/// Parse and process one inbound text message. Returns messages addressed
/// to the sender. Split from the socket loop so tests can drive dispatch
/// without a transport.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    session: &mut Session,
    text: &str,
) -> Result<Vec<ServerMessage>, Disconnect> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "ws: malformed message dropped");
            if state.rate_limiter.record_offense(session.id).is_err() {
                warn!(session_id = %session.id, "ws: malformed-message limit tripped; disconnecting");
                return Err(Disconnect);
            }
            return Ok(Vec::new());
        }
    };
    Ok(dispatch(state, session, message).await)
}

async fn dispatch(state: &AppState, session: &mut Session, message: ClientMessage) -> Vec<ServerMessage> {
    match message {
        ClientMessage::JoinRoom(room_id) => join_room(state, session, room_id).await,
        ClientMessage::LeaveRoom => {
            if let Some(room_id) = session.current_room.take() {
                registry::release(state, &room_id, session.id).await;
            }
            Vec::new()
        }
        ClientMessage::CreateElement(data) => {
            if let Some(room) = member_room(state, session, &data.room_id).await {
                room.create_element(session.id, data.element).await;
            }
            Vec::new()
        }
        ClientMessage::DeleteElement { room_id, element_id } => {
            if let Some(room) = member_room(state, session, &room_id).await {
                room.delete_element(session.id, element_id).await;
            }
            Vec::new()
        }
        ClientMessage::Undo(room_id) => {
            if let Some(room) = member_room(state, session, &room_id).await {
                room.undo(session.id).await;
            }
            Vec::new()
        }
        ClientMessage::Redo(room_id) => {
            if let Some(room) = member_room(state, session, &room_id).await {
                room.redo(session.id).await;
            }
            Vec::new()
        }
        ClientMessage::CursorMove { room_id, x, y, label } => {
            if let Some(room) = member_room(state, session, &room_id).await {
                room.cursor_move(session.id, x, y, label).await;
            }
            Vec::new()
        }
        ClientMessage::CursorLeave(room_id) => {
            if let Some(room) = member_room(state, session, &room_id).await {
                room.cursor_leave(session.id).await;
            }
            Vec::new()
        }
    }
}

async fn join_room(state: &AppState, session: &mut Session, room_id: String) -> Vec<ServerMessage> {
    // At most one room per session: leave the old one first.
    if let Some(old) = session.current_room.take() {
        registry::release(state, &old, session.id).await;
    }

    loop {
        let room = registry::get_or_create(state, &room_id).await;
        match room.join(session.id, session.outbound()).await {
            JoinOutcome::Joined(snapshot) => {
                session.current_room = Some(room_id);
                return vec![snapshot];
            }
            // Raced a teardown; the next lookup creates a fresh room.
            JoinOutcome::Evicted => {}
        }
    }
}

/// Resolve the claimed room for an operation. Messages naming a room the
/// session has not joined are dropped silently.
async fn member_room(state: &AppState, session: &Session, claimed: &str) -> Option<Arc<Room>> {
    if session.current_room.as_deref() != Some(claimed) {
        debug!(
            session_id = %session.id,
            room_id = claimed,
            "ws: dropping message for a room the session has not joined"
        );
        return None;
    }
    registry::get(state, claimed).await
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_message(socket: &mut WebSocket, session: &Session, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    if !message.is_cursor() {
        debug!(session_id = %session.id, kind = message.kind(), "ws: send message");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
