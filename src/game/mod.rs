//! Game simulation modules

pub mod arena;
pub mod body;
pub mod collision;
pub mod goal;
pub mod impulse;
pub mod r#match;
pub mod scheduler;
pub mod snapshot;
pub mod spawn;
pub mod summary;
pub mod world;

pub use r#match::{MatchRegistry, MatchRoster, MatchSetupError};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub user_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
