//! Service layer: room state transitions and relay fan-out.

pub mod room;
