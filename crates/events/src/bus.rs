//! Push-channel message envelope and in-process event bus.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`WsMessage`]s.
//! It is designed to be shared via `Arc<EventBus>` across the
//! application; the WebSocket layer forwards published messages to
//! every connected client.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Envelope vocabulary
// ---------------------------------------------------------------------------

/// What a push message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Websocket,
    Build,
    Buildlog,
    Projectversion,
}

/// What happened to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    Connected,
    Added,
    Changed,
    Removed,
}

/// Client-requested action on a subject (inbound messages only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
}

// ---------------------------------------------------------------------------
// WsMessage
// ---------------------------------------------------------------------------

/// The `{event, subject, data}` envelope for the push channel.
///
/// Outbound messages carry `event`; inbound client requests carry
/// `action` instead (e.g. buildlog start/stop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WsMessage {
    /// Outbound event message.
    pub fn event(subject: Subject, event: Event) -> Self {
        Self { subject, event: Some(event), action: None, data: None }
    }

    /// Attach a JSON payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// A chunk of build log output.
    pub fn buildlog_chunk(data: String) -> Self {
        Self::event(Subject::Buildlog, Event::Added).with_data(serde_json::Value::String(data))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`WsMessage`].
pub struct EventBus {
    sender: broadcast::Sender<WsMessage>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers.
    ///
    /// With zero subscribers the message is silently dropped.
    pub fn publish(&self, message: WsMessage) {
        let _ = self.sender.send(message);
    }

    /// Subscribe to all messages published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
