//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchRoster, MatchSetupError, PlayerInput};
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;
use crate::ws::protocol::ClientMsg;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/rooms/:room_id/match", post(start_match_handler))
        .route(
            "/rooms/:room_id/players/:user_id",
            delete(release_player_handler),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        active_players: state.match_registry.total_players(),
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

#[derive(Serialize)]
struct StartMatchResponse {
    status: &'static str,
    room_id: Uuid,
    player_count: usize,
    ws_url: String,
}

async fn start_match_handler(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(roster): Json<MatchRoster>,
) -> Result<(StatusCode, Json<StartMatchResponse>), AppError> {
    if state.start_limiter.check().is_err() {
        warn!(room_id = %room_id, "Match start rate limited");
        return Err(AppError::TooManyRequests);
    }

    let handle = state
        .match_registry
        .start(room_id, &roster, state.config.match_settings.clone())?;

    Ok((
        StatusCode::CREATED,
        Json(StartMatchResponse {
            status: "started",
            room_id,
            player_count: handle.player_count(),
            ws_url: format!("/ws?room_id={}", room_id),
        }),
    ))
}

/// Tell a running match that a player has left the room
async fn release_player_handler(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let handle = state
        .match_registry
        .get(&room_id)
        .ok_or_else(|| AppError::NotFound(format!("no running match in room {}", room_id)))?;

    handle
        .input_tx
        .send(PlayerInput {
            user_id,
            msg: ClientMsg::LeaveMatch,
            received_at: unix_millis(),
        })
        .await
        .map_err(|_| AppError::NotFound(format!("match in room {} has ended", room_id)))?;

    info!(room_id = %room_id, user_id = %user_id, "Player released from match");
    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    TooManyRequests,
}

impl From<MatchSetupError> for AppError {
    fn from(err: MatchSetupError) -> Self {
        match err {
            MatchSetupError::AlreadyRunning(_) => AppError::Conflict(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
