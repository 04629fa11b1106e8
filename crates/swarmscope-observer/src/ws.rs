//! `WebSocket` handler for live snapshot streaming.
//!
//! Clients connect to `GET /ws/swarm`, immediately receive the current
//! swarm state (if any), and then one JSON frame per publish. The handler
//! watches the synchronizer's publication channel, so a slow client only
//! ever skips intermediate snapshots and resumes from the latest one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use swarmscope_types::SwarmSnapshot;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming snapshots.
///
/// # Route
///
/// `GET /ws/swarm`
pub async fn ws_swarm(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Send one snapshot as a text frame. Returns `false` once the client is gone.
async fn send_snapshot(socket: &mut WebSocket, snapshot: &SwarmSnapshot) -> bool {
    let json = match serde_json::to_string(snapshot) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize swarm snapshot: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Handle the `WebSocket` lifecycle: push the current snapshot, then
/// forward every subsequent publish until either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    let mut rx = state.reader.subscribe();
    let initial = rx.borrow_and_update().clone();

    if let Some(snapshot) = initial {
        if !send_snapshot(&mut socket, &snapshot).await {
            debug!("WebSocket client disconnected (send failed)");
            return;
        }
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("Synchronizer dropped, shutting down WebSocket");
                    return;
                }
                let latest = rx.borrow_and_update().clone();
                let Some(snapshot) = latest else { continue };
                if !send_snapshot(&mut socket, &snapshot).await {
                    debug!("WebSocket client disconnected (send failed)");
                    return;
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
                    _ => {}
                }
            }
        }
    }
}
