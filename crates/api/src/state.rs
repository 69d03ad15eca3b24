use std::sync::Arc;

use packforge_aptly::AptlyQueue;
use packforge_events::EventBus;

use crate::auth::AuthBackend;
use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: packforge_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection and live log session registry.
    pub ws_manager: Arc<WsManager>,
    /// Fire-and-forget queue to the aptly backend.
    pub aptly_queue: AptlyQueue,
    /// In-process event bus for push notifications.
    pub event_bus: Arc<EventBus>,
    /// Authentication backend chosen at startup.
    pub auth_backend: Arc<dyn AuthBackend>,
}
