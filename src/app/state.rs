//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::util::rate_limit::{create_limiter, Limiter, MATCH_START_RATE_LIMIT};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_registry: Arc<MatchRegistry>,
    /// Server-wide throttle on match creation
    pub start_limiter: Arc<Limiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            match_registry: Arc::new(MatchRegistry::new()),
            start_limiter: create_limiter(MATCH_START_RATE_LIMIT),
        }
    }
}
