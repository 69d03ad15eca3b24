//! Connection registry tying each WebSocket connection to its send
//! channel and to at most one live log session.

use std::collections::HashMap;

use axum::extract::ws::Message;
use packforge_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

use crate::ws::livelog::LiveLogSession;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// The connection's active live log session, if any.
    pub livelog: Option<LiveLogSession>,
}

/// Manages all active WebSocket connections and their live log
/// sessions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller
    /// can forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
            livelog: None,
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection, stopping any live log session it owns.
    pub async fn remove(&self, conn_id: &str) {
        if let Some(conn) = self.connections.write().await.remove(conn_id) {
            if let Some(session) = conn.livelog {
                session.stop();
            }
        }
    }

    /// The send channel of a connection, if it is still registered.
    pub async fn sender(&self, conn_id: &str) -> Option<WsSender> {
        self.connections
            .read()
            .await
            .get(conn_id)
            .map(|conn| conn.sender.clone())
    }

    /// Attach a live log session to a connection.
    ///
    /// A connection holds at most one session: an existing one is
    /// logged and stopped cooperatively before the new one is stored.
    pub async fn start_livelog(&self, conn_id: &str, session: LiveLogSession) {
        let mut conns = self.connections.write().await;
        let Some(conn) = conns.get_mut(conn_id) else {
            tracing::warn!(conn_id, "Livelog start for unknown connection");
            session.stop();
            return;
        };
        if let Some(old) = conn.livelog.take() {
            tracing::warn!(
                conn_id,
                build_id = old.build_id(),
                "Replacing existing live log session",
            );
            old.stop();
        }
        conn.livelog = Some(session);
    }

    /// Stop and drop a connection's live log session, if any.
    pub async fn stop_livelog(&self, conn_id: &str) {
        let mut conns = self.connections.write().await;
        match conns.get_mut(conn_id).and_then(|conn| conn.livelog.take()) {
            Some(session) => session.stop(),
            None => tracing::error!(conn_id, "No active live log session found"),
        }
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they are cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Live log sessions are stopped along the way. Used during
    /// graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values_mut() {
            if let Some(session) = conn.livelog.take() {
                session.stop();
            }
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Default::default()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
