//! Session runtime for the canvas channel.
//!
//! This crate is the client half of the collaboration engine: it owns a
//! [`session::CanvasSession`] per canvas, drives the `canvas` engine from
//! pointer input, and reconciles it against the server over the `wire`
//! protocol.
//!
//! | module     | role                                                    |
//! |------------|---------------------------------------------------------|
//! | `session`  | per-canvas state machine: join/leave, merge, broadcast  |
//! | `presence` | roster mirror and the presence-refresh throttle         |
//! | `retry`    | backoff queue for outbound sends the transport refused  |
//! | `net`      | native WebSocket transport bridging a session's channels|

pub mod net;
pub mod presence;
pub mod retry;
pub mod session;
