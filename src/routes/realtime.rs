//! Real-time channel
//!
//! One socket per browser tab. Each connection runs two halves:
//! - a writer task draining the hub outbox into the socket and pinging it
//! - a reader loop dispatching client events through the hub
//!
//! A tab that only listens never sends a frame of its own; the pongs it
//! returns for the writer's pings are what keep it inside the idle window.
//!
//! The reader owns cleanup: when it stops, the connection is unregistered,
//! which closes the outbox and ends the writer.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::domain::realtime::{events, ClientEvent, WsEvent};
use crate::services::realtime::{ConnectionId, Outbox};

/// GET /ws
pub async fn ws_handler(
    RequireAuth(auth): RequireAuth,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    info!(user_id = %auth.user_id, role = ?auth.role, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

#[instrument(skip(socket, state, auth), fields(user_id = %auth.user_id))]
pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, auth: AuthContext) {
    let (ws_tx, ws_rx) = socket.split();

    let already_online = state.hub.online_users();
    let (connection_id, outbox) = state.hub.register(&auth.user_id);

    let hello = WsEvent::new(
        events::CONNECT,
        json!({
            "userId": auth.user_id,
            "connectionId": connection_id,
            "onlineUsers": already_online,
        }),
    );
    let ping_every = Duration::from_secs(state.settings.ws_ping_interval_seconds);
    let writer = tokio::spawn(write_ws(ws_tx, outbox, hello, ping_every));

    listen_ws(&state, &auth, connection_id, ws_rx).await;

    state.hub.unregister(&auth.user_id, connection_id);
    if let Err(e) = writer.await {
        warn!(error = %e, "Write task failed");
    }

    info!(%connection_id, "Connection closed");
}

async fn write_ws(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbox: Outbox,
    hello: WsEvent,
    ping_every: Duration,
) {
    if let Err(e) = ws_tx.send(Message::Text(hello.to_frame())).await {
        warn!(error = %e, "Failed to send connect event");
        return;
    }

    let mut heartbeat = interval_at(Instant::now() + ping_every, ping_every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            frame = outbox.recv() => match frame {
                Some(frame) => Message::Text(frame.to_string()),
                None => break,
            },
            _ = heartbeat.tick() => Message::Ping(Vec::new()),
        };

        if let Err(e) = ws_tx.send(message).await {
            warn!(error = %e, "Failed to write frame, closing writer");
            return;
        }
    }

    // Outbox closed: the connection was unregistered
    let _ = ws_tx.send(Message::Close(None)).await;
}

async fn listen_ws(
    state: &AppState,
    auth: &AuthContext,
    connection_id: ConnectionId,
    mut ws_rx: SplitStream<WebSocket>,
) {
    let idle_secs = state.settings.ws_idle_timeout_seconds;
    let idle = Duration::from_secs(idle_secs);

    loop {
        let msg = match timeout(idle, ws_rx.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                warn!(error = %e, "WebSocket error");
                break;
            }
            Ok(None) => {
                debug!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(timeout_secs = idle_secs, "Idle connection timeout");
                break;
            }
        };

        match msg {
            Message::Text(text) => match ClientEvent::parse(&text) {
                Ok(event) => {
                    let delivered = state.hub.dispatch(&auth.user_id, connection_id, event);
                    debug!(delivered, "Client event relayed");
                }
                Err(reason) => {
                    warn!(reason = %reason, "Rejected client event");
                    state
                        .hub
                        .emit_to_connection(&auth.user_id, connection_id, &WsEvent::error(reason));
                }
            },
            Message::Binary(_) => {
                state.hub.emit_to_connection(
                    &auth.user_id,
                    connection_id,
                    &WsEvent::error("Binary frames are not supported"),
                );
            }
            Message::Close(_) => {
                info!("Close frame received");
                break;
            }
            // Pings are answered by the transport; pongs only reset the idle timer
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}
