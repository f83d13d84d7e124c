//! HTTP surface: health, room collaborator endpoints, WebSocket upgrade

pub mod routes;

pub use routes::{build_router, AppError};
