//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::arena::{ArenaHandle, ArenaInput};
use crate::http::AppError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = futures::stream::SplitSink<WebSocket, Message>;
type WsStream = futures::stream::SplitStream<WebSocket>;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Arena to join; any arena with room when absent
    pub arena: Option<Uuid>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let arena = match query.arena {
        Some(id) => {
            let handle = state
                .arenas
                .get(&id)
                .ok_or_else(|| AppError::NotFound(format!("arena {}", id)))?;
            if !handle.has_room() {
                return Err(AppError::Unavailable(format!("arena {} is full", id)));
            }
            handle
        }
        None => state.arenas.find_or_spawn(),
    };

    let vehicle_id = Uuid::new_v4();
    info!(vehicle_id = %vehicle_id, arena_id = %arena.id, "WebSocket upgrade");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, vehicle_id, arena, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, vehicle_id: Uuid, arena: ArenaHandle, state: AppState) {
    info!(vehicle_id = %vehicle_id, arena_id = %arena.id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe first so nothing sent after the welcome is missed
    let snapshot_rx = arena.snapshot_tx.subscribe();

    let welcome = ServerMsg::Welcome {
        vehicle_id,
        arena_id: arena.id,
        server_time: unix_millis(),
        simulation_tps: state.config.arena.simulation_tps,
        mover: state.config.mover,
        reconcile: state.config.reconcile,
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(vehicle_id = %vehicle_id, error = %e, "Failed to send welcome");
        return;
    }

    let rate_limiter = ConnectionRateLimiter::new(state.config.arena.simulation_tps);
    run_session(
        vehicle_id,
        ws_sink,
        ws_stream,
        arena.input_tx,
        snapshot_rx,
        rate_limiter,
    )
    .await;

    info!(vehicle_id = %vehicle_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    vehicle_id: Uuid,
    mut ws_sink: WsSink,
    mut ws_stream: WsStream,
    input_tx: mpsc::Sender<ArenaInput>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
    rate_limiter: ConnectionRateLimiter,
) {
    // Spawn writer task: arena broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if !is_for(&msg, vehicle_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(vehicle_id = %vehicle_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Snapshots are absolute; the next one catches the client up
                    warn!(vehicle_id = %vehicle_id, lagged_count = n, "Client lagged, skipping snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(vehicle_id = %vehicle_id, "Arena channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> arena loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if !admit(&msg, &rate_limiter) {
                            warn!(vehicle_id = %vehicle_id, "Rate limited input message");
                            continue;
                        }

                        let leaving = matches!(msg, ClientMsg::Leave);
                        let input = ArenaInput {
                            vehicle_id,
                            msg,
                            received_at: unix_millis(),
                        };

                        if input_tx.send(input).await.is_err() {
                            debug!(vehicle_id = %vehicle_id, "Input channel closed");
                            break;
                        }
                        if leaving {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(vehicle_id = %vehicle_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(vehicle_id = %vehicle_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(vehicle_id = %vehicle_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(vehicle_id = %vehicle_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Despawn on disconnect; a second leave is ignored by the arena
    let _ = input_tx
        .send(ArenaInput {
            vehicle_id,
            msg: ClientMsg::Leave,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();
}

/// Only `input` samples are rate limited; control messages always pass
fn admit(msg: &ClientMsg, rate_limiter: &ConnectionRateLimiter) -> bool {
    match msg {
        ClientMsg::Input(_) => rate_limiter.check_input(),
        _ => true,
    }
}

/// Broadcasts go to everyone, targeted messages only to their vehicle
fn is_for(msg: &ServerMsg, vehicle_id: Uuid) -> bool {
    msg.recipient().map_or(true, |id| id == vehicle_id)
}

/// Failure to deliver a message to the client
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket closed: {0}")]
    Socket(#[from] axum::Error),
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), SendError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}
