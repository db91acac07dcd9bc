//! `WebSocket` handler for real-time schedule streaming.
//!
//! Clients connect to `GET /ws/schedules`, immediately receive the
//! schedule in force, then a JSON-encoded [`PublishedSchedule`] each time
//! the run loop publishes. Lagging clients skip ahead to the newest
//! schedule; only the latest one matters to a signal head.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use signal_types::PublishedSchedule;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming schedules.
///
/// # Route
///
/// `GET /ws/schedules`
pub async fn ws_schedules(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Serialize and send one schedule. Returns `false` once the client is gone.
async fn send_schedule(socket: &mut WebSocket, schedule: &PublishedSchedule) -> bool {
    let json = match serde_json::to_string(schedule) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize schedule: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    let mut rx = state.subscribe();

    let current = state.controller.current_schedule();
    if !send_schedule(&mut socket, &current).await {
        debug!("WebSocket client disconnected (send failed)");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(schedule) => {
                        if !send_schedule(&mut socket, &schedule).await {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {
                        // Clients have nothing to say on this channel.
                    }
                }
            }
        }
    }
}
