//! cosketch relay server: rooms, fan-out, and the websocket channel.

pub mod routes;
pub mod services;
pub mod state;
