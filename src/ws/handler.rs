//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::r#match::MatchHandle;
use crate::game::{MatchRegistry, PlayerInput};
use crate::http::AppError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room_id: Uuid,
    pub user_id: Uuid,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let handle = join_match(&state.match_registry, &query)?;

    info!(room_id = %query.room_id, user_id = %query.user_id, "WebSocket upgrade");

    // Subscribe before upgrading so no snapshot is missed
    let snapshot_rx = handle.snapshot_tx.subscribe();
    let input_tx = handle.input_tx;
    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, query.room_id, query.user_id, input_tx, snapshot_rx)
    }))
}

/// Look up the room's match and check the user is still on its roster
fn join_match(registry: &MatchRegistry, query: &WsQuery) -> Result<MatchHandle, AppError> {
    let handle = registry
        .get(&query.room_id)
        .ok_or_else(|| AppError::NotFound(format!("no running match in room {}", query.room_id)))?;

    if !handle.is_participant(&query.user_id) {
        warn!(room_id = %query.room_id, user_id = %query.user_id, "Rejected non-participant socket");
        return Err(AppError::Forbidden(format!(
            "user {} is not playing in room {}",
            query.user_id, query.room_id
        )));
    }
    Ok(handle)
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    room_id: Uuid,
    user_id: Uuid,
    input_tx: mpsc::Sender<PlayerInput>,
    snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    info!(room_id = %room_id, user_id = %user_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        user_id,
        room_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(user_id, ws_sink, ws_stream, input_tx, snapshot_rx).await;

    info!(room_id = %room_id, user_id = %user_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split.
///
/// Closing the socket leaves the player in the match. Only the room service
/// releases departed players.
async fn run_session<S, R>(
    user_id: Uuid,
    mut ws_sink: S,
    mut ws_stream: R,
    input_tx: mpsc::Sender<PlayerInput>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: std::fmt::Display + Send,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let rate_limiter = PlayerRateLimiter::new();

    // Spawn writer task: room broadcast -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    let Some(msg) = msg.for_recipient(user_id) else {
                        continue;
                    };
                    let finished = matches!(msg, ServerMsg::MatchEnd { .. });
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(user_id = %user_id, error = %e, "WebSocket send failed");
                        break;
                    }
                    if finished {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        user_id = %user_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(user_id = %user_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_command() {
                    warn!(user_id = %user_id, "Rate limited command message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let input = PlayerInput {
                            user_id,
                            msg: client_msg,
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(user_id = %user_id, "Match input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
