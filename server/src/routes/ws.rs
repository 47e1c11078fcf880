//! WebSocket channel handler — the canvas relay.
//!
//! DESIGN
//! ======
//! On upgrade, each connection gets an ID and enters a `select!` loop:
//! inbound client messages dispatch to the room service, broadcasts from
//! peers flow back out through a per-connection channel. `process_message`
//! is the dispatch seam: it mutates room state and returns only the
//! messages owed to the sender, so tests can drive it without a socket.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → identity from query params, fresh connection ID
//! 2. `join` → register with the room → `joined` ack with the snapshot
//! 3. Shape and selection ops → LWW into the room, relay to peers
//! 4. `leave` or socket close → unregister → `user_left` to peers

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;
use wire::{ClientMessage, ServerMessage};

use crate::services::room;
use crate::state::AppState;

/// Outbound queue depth per connection; a slower consumer drops broadcasts
/// rather than stalling the room.
const OUTBOUND_DEPTH: usize = 256;

// =============================================================================
// UPGRADE
// =============================================================================

/// Identity riding on the upgrade request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

pub async fn handle_channel(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let client_id = Uuid::new_v4();
    let user_id = params.user_id.unwrap_or_else(|| format!("user-{client_id}"));
    let display_name = params.display_name.unwrap_or_else(|| "Anonymous".to_string());
    ws.on_upgrade(move |socket| run_channel(socket, state, client_id, user_id, display_name))
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-connection context threaded through dispatch.
struct ChannelConn {
    client_id: Uuid,
    user_id: String,
    display_name: String,
    /// The canvas this connection has joined, if any.
    canvas_id: Option<String>,
    /// Sender handed to the room for peer broadcasts.
    tx: mpsc::Sender<ServerMessage>,
}

async fn run_channel(
    mut socket: WebSocket,
    state: AppState,
    client_id: Uuid,
    user_id: String,
    display_name: String,
) {
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_DEPTH);
    info!(%client_id, %user_id, "channel connected");

    let mut conn = ChannelConn { client_id, user_id, display_name, canvas_id: None, tx: client_tx };

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_text(&state, &mut conn, &text).await;
                        for reply in replies {
                            // Send failures surface on the next recv.
                            let _ = send_message(&mut socket, &reply).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(msg) = client_rx.recv() => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(canvas_id) = conn.canvas_id.take() {
        room::unregister(&state, &canvas_id, client_id).await;
    }
    info!(%client_id, "channel disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and process one inbound frame. A malformed frame is logged and
/// skipped, never fatal to the connection.
async fn process_text(state: &AppState, conn: &mut ChannelConn, text: &str) -> Vec<ServerMessage> {
    match wire::decode_client(text) {
        Ok(msg) => process_message(state, conn, msg).await,
        Err(err) => {
            warn!(client_id = %conn.client_id, %err, "ignoring malformed frame");
            Vec::new()
        }
    }
}

/// Apply one client message to room state and return the messages owed to
/// the sender. Peer broadcasts happen inside the room service.
async fn process_message(
    state: &AppState,
    conn: &mut ChannelConn,
    msg: ClientMessage,
) -> Vec<ServerMessage> {
    match msg {
        ClientMessage::Join { canvas_id } => {
            if let Some(old) = conn.canvas_id.take() {
                if old != canvas_id {
                    room::unregister(state, &old, conn.client_id).await;
                }
            }
            let snapshot = room::register(
                state,
                &canvas_id,
                conn.client_id,
                &conn.user_id,
                &conn.display_name,
                conn.tx.clone(),
            )
            .await;
            conn.canvas_id = Some(canvas_id.clone());
            vec![ServerMessage::Joined {
                canvas_id,
                shapes: snapshot.shapes,
                users: snapshot.users,
                user_color: snapshot.user_color,
            }]
        }
        ClientMessage::Leave { canvas_id } => {
            if conn.canvas_id.as_deref() == Some(canvas_id.as_str()) {
                room::unregister(state, &canvas_id, conn.client_id).await;
                conn.canvas_id = None;
            } else {
                warn!(client_id = %conn.client_id, %canvas_id, "leave for a canvas not joined");
            }
            // Ack regardless so the client's leave always resolves.
            vec![ServerMessage::Left]
        }
        ClientMessage::ShapeAdd { canvas_id, shape } => {
            if let Some(canvas_id) = on_canvas(conn, canvas_id) {
                room::apply_shape_add(state, &canvas_id, conn.client_id, shape).await;
            }
            Vec::new()
        }
        ClientMessage::ShapeUpdate { canvas_id, shape } => {
            if let Some(canvas_id) = on_canvas(conn, canvas_id) {
                room::apply_shape_update(state, &canvas_id, conn.client_id, shape).await;
            }
            Vec::new()
        }
        ClientMessage::ShapeRemove { canvas_id, shape_id } => {
            if let Some(canvas_id) = on_canvas(conn, canvas_id) {
                room::apply_shape_remove(state, &canvas_id, conn.client_id, shape_id).await;
            }
            Vec::new()
        }
        // The frame's identity fields are ignored; the registered
        // connection is authoritative.
        ClientMessage::Selection { canvas_id, shape_ids, .. } => {
            if let Some(canvas_id) = on_canvas(conn, canvas_id) {
                room::apply_selection(state, &canvas_id, conn.client_id, &shape_ids).await;
            }
            Vec::new()
        }
        ClientMessage::PresenceRefresh { canvas_id } => {
            let Some(canvas_id) = on_canvas(conn, canvas_id) else {
                return Vec::new();
            };
            let users = room::roster(state, &canvas_id).await;
            vec![ServerMessage::Users { canvas_id, users }]
        }
        ClientMessage::Ping { ts } => {
            vec![ServerMessage::Pong { ts }]
        }
    }
}

/// Guard: the message's canvas must be the one this connection joined.
fn on_canvas(conn: &ChannelConn, canvas_id: String) -> Option<String> {
    if conn.canvas_id.as_deref() == Some(canvas_id.as_str()) {
        Some(canvas_id)
    } else {
        warn!(client_id = %conn.client_id, %canvas_id, "op for a canvas not joined");
        None
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), ()> {
    let json = match wire::encode_server(msg) {
        Ok(json) => json,
        Err(err) => {
            warn!(%err, op = msg.op(), "failed to encode outbound message; skipping");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
