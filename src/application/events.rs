//! Broadcast event bus for presentation layers.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no subscribers is a
//! no-op, so the core never depends on anyone listening.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::entities::ConnectionState;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
}

/// Domain events emitted by the core components
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotEvent {
    ConnectionChanged { state: ConnectionState },
    ChatReceived { sender: String, text: String },
    CommandAnswered { command: String, response: String },
    AutoMessageSent { id: String, text: String },
    CommandsChanged,
    AutoMessagesChanged,
    SchedulerChanged { state: SchedulerState },
}

/// Multi-consumer event bus. Cloning shares the sender.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: BotEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
