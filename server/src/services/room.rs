//! Room service — registration, relay, and presence for canvas rooms.
//!
//! DESIGN
//! ======
//! Every operation takes the whole `AppState` and locks the rooms map for
//! as short a span as it can. Broadcasts happen inside the same critical
//! section via non-blocking sends, so a message and the state change it
//! describes are ordered identically for every peer. All broadcasts
//! exclude the sending connection; the sender already applied its own
//! edit optimistically.
//!
//! LIFECYCLE
//! =========
//! `register` answers with a [`JoinSnapshot`] and announces `user_joined`
//! to peers — unless the user is already present through another
//! connection (reconnect, second tab). `unregister` mirrors that:
//! `user_left` and the selection purge fire only when the user's last
//! connection goes. A periodic sweep unregisters connections whose
//! outbound channel has closed.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use canvas::shape::{Shape, ShapeId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wire::{ServerMessage, WireUser};

use crate::state::{AppState, Connection, Room, SelectionOwner};

/// How often closed connections are swept out of the rooms.
pub const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// USER COLORS
// =============================================================================

/// Palette of assignable user colors.
pub const USER_COLORS: [&str; 16] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4",
    "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9", "#F8C471", "#82E0AA",
    "#F1948A", "#AED6F1", "#A9DFBF", "#F9E79F",
];

/// 32-bit FNV-1a. Stable across runs, so a returning user lands on the
/// same palette slot.
fn fnv1a(input: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// Pick a color for a new user: hash into the palette, scan forward past
/// colors already taken on this canvas, and fall back to an arithmetic
/// channel shift once all sixteen are in use.
fn pick_user_color(user_id: &str, taken: &[String]) -> String {
    let primary = fnv1a(user_id) as usize % USER_COLORS.len();
    for offset in 0..USER_COLORS.len() {
        let candidate = USER_COLORS[(primary + offset) % USER_COLORS.len()];
        if !taken.iter().any(|color| color == candidate) {
            return candidate.to_string();
        }
    }
    color_variation(USER_COLORS[primary], taken.len())
}

/// Shift each RGB channel by a factor-derived offset, wrapping per channel.
fn color_variation(base: &str, factor: usize) -> String {
    let Ok(rgb) = u32::from_str_radix(base.trim_start_matches('#'), 16) else {
        return base.to_string();
    };
    let shift = (factor % 8) as u32 * 8;
    let r = (((rgb >> 16) & 0xFF) + shift) % 256;
    let g = (((rgb >> 8) & 0xFF) + shift) % 256;
    let b = ((rgb & 0xFF) + shift) % 256;
    format!("#{r:02X}{g:02X}{b:02X}")
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Everything a joining client needs: its assigned color, the canvas
/// content, and who is already there.
#[derive(Debug, Clone)]
pub struct JoinSnapshot {
    pub user_color: String,
    pub shapes: Vec<Shape>,
    pub users: Vec<WireUser>,
}

/// Add a connection to a canvas room, creating the room on first join.
///
/// A user already present through another connection keeps their color and
/// triggers no `user_joined` broadcast.
pub async fn register(
    state: &AppState,
    canvas_id: &str,
    client_id: Uuid,
    user_id: &str,
    display_name: &str,
    tx: mpsc::Sender<ServerMessage>,
) -> JoinSnapshot {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(canvas_id.to_string()).or_default();

    let existing_color = room
        .connections
        .values()
        .find(|conn| conn.user_id == user_id)
        .map(|conn| conn.user_color.clone());
    let rejoining = existing_color.is_some();

    let user_color = existing_color.unwrap_or_else(|| {
        let taken = assigned_colors(room);
        pick_user_color(user_id, &taken)
    });

    room.connections.insert(
        client_id,
        Connection {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            user_color: user_color.clone(),
            tx,
        },
    );

    let mut shapes: Vec<Shape> = room.shapes.values().cloned().collect();
    shapes.sort_by_key(|shape| (shape.z_index, shape.id));
    let users = room_users(room);

    if rejoining {
        debug!(%canvas_id, %user_id, "suppressing user_joined for a user already present");
    } else {
        let joined = ServerMessage::UserJoined {
            user: WireUser {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                user_color: user_color.clone(),
            },
        };
        send_to_room(room, &joined, Some(client_id));
    }

    info!(
        %canvas_id, %client_id, %user_id, %user_color,
        clients = room.connections.len(),
        "client registered"
    );
    JoinSnapshot { user_color, shapes, users }
}

/// Drop a connection from a canvas room.
///
/// When the user's last connection goes, their selection entries are
/// purged (peers get an empty `selection` on their behalf) and `user_left`
/// is broadcast. While another tab keeps the user present, both are
/// suppressed.
pub async fn unregister(state: &AppState, canvas_id: &str, client_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(canvas_id) else {
        return;
    };
    let Some(conn) = room.connections.remove(&client_id) else {
        warn!(%canvas_id, %client_id, "unregister for an unknown connection");
        return;
    };

    info!(
        %canvas_id, %client_id, user_id = %conn.user_id,
        remaining = room.connections.len(),
        "client unregistered"
    );

    if room.user_connections(&conn.user_id) > 0 {
        debug!(user_id = %conn.user_id, "user still connected elsewhere; suppressing user_left");
        return;
    }

    let owned_before = room.selections.len();
    room.selections.retain(|_, owner| owner.user_id != conn.user_id);
    if room.selections.len() != owned_before {
        let cleared = ServerMessage::Selection {
            canvas_id: canvas_id.to_string(),
            user_id: conn.user_id.clone(),
            user_color: conn.user_color.clone(),
            shape_ids: Vec::new(),
        };
        send_to_room(room, &cleared, None);
    }

    let left = ServerMessage::UserLeft {
        user: WireUser {
            user_id: conn.user_id,
            display_name: conn.display_name,
            user_color: conn.user_color,
        },
    };
    send_to_room(room, &left, None);
}

// =============================================================================
// SHAPE RELAY
// =============================================================================

/// Accept a shape insert and relay it to the sender's peers.
pub async fn apply_shape_add(state: &AppState, canvas_id: &str, sender: Uuid, shape: Shape) {
    upsert_shape(state, canvas_id, sender, shape, true).await;
}

/// Accept a shape update and relay it to the sender's peers.
pub async fn apply_shape_update(state: &AppState, canvas_id: &str, sender: Uuid, shape: Shape) {
    upsert_shape(state, canvas_id, sender, shape, false).await;
}

async fn upsert_shape(state: &AppState, canvas_id: &str, sender: Uuid, shape: Shape, added: bool) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(canvas_id) else {
        return;
    };
    let shape_id = shape.id;
    room.shapes.insert(shape_id, shape.clone());

    let msg = if added {
        ServerMessage::ShapeAdd { canvas_id: canvas_id.to_string(), shape }
    } else {
        ServerMessage::ShapeUpdate { canvas_id: canvas_id.to_string(), shape }
    };
    send_to_room(room, &msg, Some(sender));
    debug!(%canvas_id, %shape_id, total = room.shapes.len(), "shape upserted");
}

/// Accept a shape removal: the shape goes, any selection claim on it goes
/// with it, and peers hear about the removal.
pub async fn apply_shape_remove(state: &AppState, canvas_id: &str, sender: Uuid, shape_id: ShapeId) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(canvas_id) else {
        return;
    };
    room.shapes.remove(&shape_id);
    room.selections.remove(&shape_id);

    let msg = ServerMessage::ShapeRemove { canvas_id: canvas_id.to_string(), shape_id };
    send_to_room(room, &msg, Some(sender));
    debug!(%canvas_id, %shape_id, total = room.shapes.len(), "shape removed");
}

// =============================================================================
// SELECTION RELAY
// =============================================================================

/// Replace the sending user's selection entries with `shape_ids` and relay
/// the claim. Identity comes from the registered connection, never from
/// the frame.
pub async fn apply_selection(state: &AppState, canvas_id: &str, sender: Uuid, shape_ids: &[ShapeId]) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(canvas_id) else {
        return;
    };
    let Some(conn) = room.connections.get(&sender) else {
        warn!(%canvas_id, %sender, "selection from an unregistered connection");
        return;
    };
    let user_id = conn.user_id.clone();
    let user_color = conn.user_color.clone();

    room.selections.retain(|_, owner| owner.user_id != user_id);
    for shape_id in shape_ids {
        room.selections.insert(
            *shape_id,
            SelectionOwner { user_id: user_id.clone(), user_color: user_color.clone() },
        );
    }

    let msg = ServerMessage::Selection {
        canvas_id: canvas_id.to_string(),
        user_id,
        user_color,
        shape_ids: shape_ids.to_vec(),
    };
    send_to_room(room, &msg, Some(sender));
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Users currently on a canvas, one entry per user even across tabs,
/// ordered by user ID.
pub async fn roster(state: &AppState, canvas_id: &str) -> Vec<WireUser> {
    let rooms = state.rooms.read().await;
    rooms.get(canvas_id).map(room_users).unwrap_or_default()
}

fn room_users(room: &Room) -> Vec<WireUser> {
    let mut users: BTreeMap<&str, WireUser> = BTreeMap::new();
    for conn in room.connections.values() {
        users.entry(&conn.user_id).or_insert_with(|| WireUser {
            user_id: conn.user_id.clone(),
            display_name: conn.display_name.clone(),
            user_color: conn.user_color.clone(),
        });
    }
    users.into_values().collect()
}

/// Colors already assigned on a canvas, one per unique user.
fn assigned_colors(room: &Room) -> Vec<String> {
    let mut per_user: HashMap<&str, &str> = HashMap::new();
    for conn in room.connections.values() {
        per_user.insert(&conn.user_id, &conn.user_color);
    }
    per_user.values().map(|color| (*color).to_string()).collect()
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Fan a message out to a room's connections. Full or closed channels are
/// logged and skipped; the stale sweep reaps the closed ones.
fn send_to_room(room: &Room, msg: &ServerMessage, exclude: Option<Uuid>) {
    for (client_id, conn) in &room.connections {
        if exclude == Some(*client_id) {
            continue;
        }
        if let Err(err) = conn.tx.try_send(msg.clone()) {
            warn!(%client_id, op = msg.op(), %err, "skipping unreachable client");
        }
    }
}

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Unregister every connection whose outbound channel has closed, exactly
/// as if it had left. Returns how many were dropped.
pub async fn cleanup_stale(state: &AppState) -> usize {
    let stale: Vec<(String, Uuid)> = {
        let rooms = state.rooms.read().await;
        rooms
            .iter()
            .flat_map(|(canvas_id, room)| {
                room.connections
                    .iter()
                    .filter(|(_, conn)| conn.tx.is_closed())
                    .map(move |(client_id, _)| (canvas_id.clone(), *client_id))
            })
            .collect()
    };

    for (canvas_id, client_id) in &stale {
        info!(%canvas_id, %client_id, "dropping stale connection");
        unregister(state, canvas_id, *client_id).await;
    }
    stale.len()
}

/// Spawn the periodic stale-connection sweep.
pub fn spawn_stale_sweep(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STALE_SWEEP_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let dropped = cleanup_stale(&state).await;
            if dropped > 0 {
                info!(dropped, "stale connection sweep");
            }
        }
    })
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
