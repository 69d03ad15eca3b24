//! Packforge event types and in-process notification bus.
//!
//! - [`WsMessage`]: the `{event, subject, data}` envelope spoken on the
//!   WebSocket push channel.
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.

pub mod bus;

pub use bus::{Action, Event, EventBus, Subject, WsMessage};
