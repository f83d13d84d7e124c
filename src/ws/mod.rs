//! WebSocket transport and wire types

pub mod handler;
pub mod protocol;
