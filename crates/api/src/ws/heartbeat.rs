//! Periodic WebSocket heartbeat.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ws::manager::WsManager;

/// How often to ping all connected clients.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the heartbeat task pinging every connection on a fixed
/// interval. Stale connections fail their next send and get cleaned up
/// by their own receive loops.
pub fn start_heartbeat(manager: Arc<WsManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            manager.ping_all().await;
        }
    })
}
