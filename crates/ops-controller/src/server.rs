//! WebSocket transport.
//!
//! `GET /ws` upgrades to a persistent bidirectional event stream. Each socket
//! gets a connection id and a split pump: a forward task drains the
//! per-connection outbound channel into the socket, while the read loop
//! decodes client events and hands them to the coordinator. Malformed frames
//! are logged and skipped — a bad client event never tears the socket down.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use common::types::ConnectionId;
use futures_util::sink::SinkExt;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actors::CoordinatorHandle;
use crate::protocol::ClientEvent;

/// Shared state for the transport router.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    /// Per-connection outbound event buffer size.
    pub outbound_buffer: usize,
}

/// Build the transport router.
pub fn build_router(state: AppState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Pump one WebSocket connection until it closes.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let connection_id = ConnectionId::new();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(state.outbound_buffer);

    if state
        .coordinator
        .connect(connection_id, outbound_tx)
        .await
        .is_err()
    {
        warn!(target: "oc.server", "Coordinator unavailable, dropping connection");
        return;
    }

    info!(
        target: "oc.server",
        connection_id = %connection_id,
        "WebSocket connection established"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Forward coordinator -> client events.
    let forward = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Decode client -> coordinator events.
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if state.coordinator.event(connection_id, event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(
                        target: "oc.server",
                        connection_id = %connection_id,
                        error = %e,
                        "Malformed client frame ignored"
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                debug!(
                    target: "oc.server",
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket error, closing"
                );
                break;
            }
        }
    }

    // Transport teardown is the one and only offline path.
    if let Err(e) = state.coordinator.disconnect(connection_id).await {
        warn!(target: "oc.server", error = %e, "Disconnect notification failed");
    }
    forward.abort();

    info!(
        target: "oc.server",
        connection_id = %connection_id,
        "WebSocket connection closed"
    );
}
