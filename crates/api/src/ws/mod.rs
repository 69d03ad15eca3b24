//! WebSocket push channel: connection registry, live build-log
//! sessions, inbound message dispatch and the heartbeat task.

pub mod handler;
pub mod heartbeat;
pub mod livelog;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use livelog::{BuildStateProbe, LiveLogSession};
pub use manager::{WsManager, WsSender};
