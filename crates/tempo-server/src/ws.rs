//! Observer `WebSocket` handler.
//!
//! Clients connect to `GET /ws`. Each socket becomes one hub session: the
//! first frame it receives is `link-status`, followed by whatever the hub
//! broadcasts. Text frames from the client are decoded as commands;
//! frames that do not decode are dropped.
//!
//! The session is removed from the hub when the socket closes for any
//! reason, including a failed send.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tempo_core::hub::Connection;
use tempo_types::ClientCommand;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to an observer `WebSocket`.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_observer(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let Connection {
        session,
        mut events,
    } = match state.hub.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            warn!(error = %e, "Rejecting observer socket");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            // Outbound: hub events for this session.
            event = events.recv() => {
                let Some(event) = event else {
                    // Hub shut down: finish the closing handshake.
                    debug!(session = %session, "Session outbox closed");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(event = event.name(), "Failed to serialize server event: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!(session = %session, "Observer disconnected (send failed)");
                    break;
                }
            }
            // Inbound: commands and control frames.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ClientCommand::decode(text.as_str()) {
                        Ok(command) => {
                            if state.hub.command(session, command).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(session = %session, error = %e, "Dropping undecodable frame");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session = %session, "Observer disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(session = %session, "Observer disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(session = %session, "WebSocket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }

    if let Err(e) = state.hub.disconnect(session).await {
        debug!(session = %session, error = %e, "Hub gone before disconnect");
    }
}
