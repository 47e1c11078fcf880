//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the map of live canvas rooms. A room keeps the latest shape
//! snapshot, the connected clients, and the selection owners — everything
//! a late joiner needs to converge. Rooms live for the lifetime of the
//! process, so a canvas survives everyone leaving.

use std::collections::HashMap;
use std::sync::Arc;

use canvas::shape::{Shape, ShapeId};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;
use wire::ServerMessage;

// =============================================================================
// CONNECTION
// =============================================================================

/// One live websocket connection to a canvas.
#[derive(Debug, Clone)]
pub struct Connection {
    pub user_id: String,
    pub display_name: String,
    pub user_color: String,
    /// Sender feeding the connection's outbound pump.
    pub tx: mpsc::Sender<ServerMessage>,
}

/// Current owner of a selected shape.
#[derive(Debug, Clone)]
pub struct SelectionOwner {
    pub user_id: String,
    pub user_color: String,
}

// =============================================================================
// ROOM
// =============================================================================

/// Per-canvas live state.
#[derive(Debug, Default)]
pub struct Room {
    /// Latest accepted shape per ID. Last write wins.
    pub shapes: HashMap<ShapeId, Shape>,
    /// Live connections keyed by connection ID.
    pub connections: HashMap<Uuid, Connection>,
    /// One selection owner per shape; a newer claim displaces an older one.
    pub selections: HashMap<ShapeId, SelectionOwner>,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many live connections `user_id` holds on this canvas.
    #[must_use]
    pub fn user_connections(&self, user_id: &str) -> usize {
        self.connections.values().filter(|conn| conn.user_id == user_id).count()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared relay state. Clone is required by Axum — the rooms map is
/// Arc-wrapped.
#[derive(Clone, Default)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
