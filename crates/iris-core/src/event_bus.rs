//! Session event broadcasting.
//!
//! Views (terminal printer, report panel, anything embedding the core)
//! subscribe to the [`EventBus`] and re-render from the session when
//! something changes.
//!
//! # Example
//!
//! ```rust
//! use iris_core::event_bus::{EventBus, SessionEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::Reset { generation: 1 });
//!
//! // In async context: let event = rx.recv().await.unwrap();
//! assert!(rx.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::mode::Mode;
use crate::session::Role;
use crate::speech::SpeechEvent;

/// Default channel capacity for the event bus.
/// Events beyond this capacity will cause slow subscribers to miss events (lag).
const DEFAULT_CAPACITY: usize = 256;

/// Something observable happened to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    ModeLocked { mode: Mode },
    ImageAttached { file_name: String, byte_size: usize },
    MessageAppended { index: usize, role: Role },
    RequestStarted { generation: u64 },
    RequestFinished { generation: u64, ok: bool },
    /// A response arrived for a session that has since been reset
    ResponseDiscarded { generation: u64 },
    InsightsUpdated,
    SessionResumed { session_id: String },
    Reset { generation: u64 },
    Speech(SpeechEvent),
}

/// Broadcast bus for [`SessionEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new EventBus with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event; with no
    /// subscribers the event is dropped.
    pub fn emit(&self, event: SessionEvent) -> usize {
        log::trace!("session event: {:?}", event);
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
