//! WebSocket transport for pairing clients.
//!
//! # Responsibilities
//! - Admit the upgrade (or refuse it once `max_connections` sockets are live)
//! - Run one writer task draining the connection's outgoing event queue
//! - Parse inbound frames and hand them to the session coordinator in order
//! - Clean up through the coordinator when the socket closes
//!
//! # Data Flow
//! ```text
//! Client ──frames──→ reader loop ──ClientEvent──→ SessionCoordinator
//! Client ←─frames─── writer task ←─ServerEvent─── registry (mpsc)
//! ```
//!
//! # Design Decisions
//! - One JSON object per frame: `{"event": ..., "data": ...}`
//! - Binary frames are accepted when they hold UTF-8 JSON
//! - Malformed frames are logged and skipped; the socket stays open

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::http::server::AppState;
use crate::lifecycle::shutdown::recv_shutdown;
use crate::net::connection::ConnectionGuard;
use crate::observability::metrics;
use crate::pairing::types::{ClientEvent, ServerEvent};

/// WebSocket upgrade handler.
pub async fn websocket_handler(
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    let Some(guard) = state.tracker.try_track(state.max_connections) else {
        tracing::warn!(
            remote_addr = %remote_addr,
            max_connections = state.max_connections,
            "Connection limit reached, refusing upgrade"
        );
        metrics::record_rejected_connection();
        return (StatusCode::SERVICE_UNAVAILABLE, "Connection limit reached").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, guard, remote_addr))
}

/// Parse one inbound text payload.
pub fn parse_event(text: &str) -> Result<ClientEvent, serde_json::Error> {
    serde_json::from_str(text)
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    guard: ConnectionGuard,
    remote_addr: SocketAddr,
) {
    let connection_id = guard.id();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(connection_id = %connection_id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut shutdown = state.shutdown.subscribe();
    state.coordinator.connect(connection_id, tx);
    tracing::debug!(connection_id = %connection_id, remote_addr = %remote_addr, "WebSocket open");

    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = recv_shutdown(&mut shutdown) => {
                tracing::debug!(connection_id = %connection_id, "Closing socket for shutdown");
                break;
            }
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            None => break,
        };

        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(connection_id = %connection_id, bytes = data.len(), "Ignoring non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        match parse_event(&text) {
            Ok(event) => {
                tracing::debug!(connection_id = %connection_id, event = ?event, "Event received");
                state.coordinator.handle(connection_id, event).await;
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Ignoring malformed frame");
            }
        }
    }

    state.coordinator.disconnect(connection_id);
    // The registry held the last sender; the writer flushes what is queued and exits.
    let _ = writer.await;
    drop(guard);
}
