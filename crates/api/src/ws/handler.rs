//! WebSocket upgrade handler and inbound message dispatch.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use packforge_events::{Action, Event, Subject, WsMessage};

use crate::state::AppState;
use crate::ws::livelog::LiveLogSession;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Dispatches inbound messages on the current task.
///   4. Cleans up on disconnect (stopping any live log session).
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Greet the client so it knows the push channel is live.
    if let Some(sender) = state.ws_manager.sender(&conn_id).await {
        let hello = WsMessage::event(Subject::Websocket, Event::Connected);
        if let Ok(text) = serde_json::to_string(&hello) {
            let _ = sender.send(Message::Text(text.into()));
        }
    }

    // Receiver loop: dispatch inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                dispatch(&state, &conn_id, &text).await;
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection (stops the live log session) and
    // abort the sender task.
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Route an inbound request to its handler.
///
/// Recognized: `{subject: "buildlog", action: "start", data: {build_id}}`
/// and `{subject: "buildlog", action: "stop"}`.
async fn dispatch(state: &AppState, conn_id: &str, text: &str) {
    let message: WsMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(conn_id, error = %e, "Cannot parse WebSocket message");
            return;
        }
    };

    match (message.subject, message.action) {
        (Subject::Buildlog, Some(Action::Start)) => {
            let build_id = message
                .data
                .as_ref()
                .and_then(|d| d.get("build_id"))
                .and_then(|v| v.as_i64());
            let Some(build_id) = build_id else {
                tracing::error!(conn_id, "Livelog start without build ID");
                return;
            };
            start_livelog(state, conn_id, build_id).await;
        }
        (Subject::Buildlog, Some(Action::Stop)) => {
            state.ws_manager.stop_livelog(conn_id).await;
        }
        _ => {
            tracing::error!(conn_id, subject = ?message.subject, "Unknown WebSocket request");
        }
    }
}

async fn start_livelog(state: &AppState, conn_id: &str, build_id: i64) {
    let Some(sender) = state.ws_manager.sender(conn_id).await else {
        tracing::warn!(conn_id, "Livelog start for vanished connection");
        return;
    };
    let session = LiveLogSession::spawn(
        build_id,
        state.config.buildout.log_path(build_id),
        Arc::new(state.pool.clone()),
        sender,
    );
    state.ws_manager.start_livelog(conn_id, session).await;
}
