//! Wire — the message vocabulary of the canvas channel.
//!
//! ARCHITECTURE
//! ============
//! Every exchange on the canvas channel is one JSON text frame: an `op` tag
//! plus camelCase payload keys. Clients send [`ClientMessage`], the server
//! answers and broadcasts [`ServerMessage`]. Shape payloads are `canvas`
//! types serialized directly; there is no separate DTO layer to drift out
//! of sync.
//!
//! DESIGN
//! ======
//! - `op` values are snake_case, payload keys camelCase.
//! - `shape_remove` carries the bare `shapeId`; every other shape-carrying
//!   op sends the full shape.
//! - Ephemeral shape IDs fail encoding (see `canvas::shape::ShapeId`), so a
//!   preview can never leak onto the channel.
//! - Decoding never panics: anything malformed comes back as
//!   [`CodecError::Malformed`] for the caller to log and drop.


use canvas::shape::{Shape, ShapeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// TYPES
// =============================================================================

/// One entry in a canvas roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    pub user_id: String,
    pub display_name: String,
    pub user_color: String,
}

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join { canvas_id: String },
    #[serde(rename_all = "camelCase")]
    Leave { canvas_id: String },
    #[serde(rename_all = "camelCase")]
    ShapeAdd { canvas_id: String, shape: Shape },
    #[serde(rename_all = "camelCase")]
    ShapeUpdate { canvas_id: String, shape: Shape },
    #[serde(rename_all = "camelCase")]
    ShapeRemove { canvas_id: String, shape_id: ShapeId },
    /// The sender's complete current selection, not a delta.
    #[serde(rename_all = "camelCase")]
    Selection {
        canvas_id: String,
        user_id: String,
        user_color: String,
        shape_ids: Vec<ShapeId>,
    },
    #[serde(rename_all = "camelCase")]
    PresenceRefresh { canvas_id: String },
    Ping {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ts: Option<u64>,
    },
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join acknowledgment: the canvas snapshot, the roster, and the color
    /// assigned to the joining user.
    #[serde(rename_all = "camelCase")]
    Joined {
        canvas_id: String,
        shapes: Vec<Shape>,
        users: Vec<WireUser>,
        user_color: String,
    },
    /// Leave acknowledgment.
    Left,
    #[serde(rename_all = "camelCase")]
    ShapeAdd { canvas_id: String, shape: Shape },
    #[serde(rename_all = "camelCase")]
    ShapeUpdate { canvas_id: String, shape: Shape },
    #[serde(rename_all = "camelCase")]
    ShapeRemove { canvas_id: String, shape_id: ShapeId },
    #[serde(rename_all = "camelCase")]
    Selection {
        canvas_id: String,
        user_id: String,
        user_color: String,
        shape_ids: Vec<ShapeId>,
    },
    /// Full roster, answering `presence_refresh`.
    #[serde(rename_all = "camelCase")]
    Users { canvas_id: String, users: Vec<WireUser> },
    UserJoined { user: WireUser },
    UserLeft { user: WireUser },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        ts: Option<u64>,
    },
}

// =============================================================================
// OP NAMES
// =============================================================================

impl ClientMessage {
    /// The `op` tag, for logging without re-serializing.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::ShapeAdd { .. } => "shape_add",
            Self::ShapeUpdate { .. } => "shape_update",
            Self::ShapeRemove { .. } => "shape_remove",
            Self::Selection { .. } => "selection",
            Self::PresenceRefresh { .. } => "presence_refresh",
            Self::Ping { .. } => "ping",
        }
    }
}

impl ServerMessage {
    /// The `op` tag, for logging without re-serializing.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::Left => "left",
            Self::ShapeAdd { .. } => "shape_add",
            Self::ShapeUpdate { .. } => "shape_update",
            Self::ShapeRemove { .. } => "shape_remove",
            Self::Selection { .. } => "selection",
            Self::Users { .. } => "users",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::Pong { .. } => "pong",
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encoding or decoding failure on the canvas channel.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The outbound message would not serialize. The one realistic cause is
    /// an ephemeral shape ID reaching the codec.
    #[error("message failed to encode: {0}")]
    Encode(serde_json::Error),
    /// Inbound text that is not a valid channel message.
    #[error("malformed channel message: {0}")]
    Malformed(serde_json::Error),
}

pub fn encode_client(msg: &ClientMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::Encode)
}

pub fn decode_client(text: &str) -> Result<ClientMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Malformed)
}

pub fn encode_server(msg: &ServerMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::Encode)
}

pub fn decode_server(text: &str) -> Result<ServerMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Malformed)
}
