use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::{ChatMessage, ConnectionConfig, ConnectionState};

/// Outbound seam shared by the command dispatcher and the auto-message
/// scheduler.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// True while the relay session is established.
    fn is_connected(&self) -> bool;

    /// Send a chat line to the joined channel.
    ///
    /// Without a session nothing is written; the line is dropped with a
    /// warning and the caller gets `BotError::Connection` back so it can
    /// skip any bookkeeping tied to a delivered message.
    async fn send(&self, text: &str) -> Result<(), BotError>;
}

/// Relay trait - abstraction over the chat transport
#[async_trait]
pub trait Relay: ChatSender {
    fn state(&self) -> ConnectionState;

    /// Log in and join. Inbound chat arrives on the returned channel until
    /// the session ends.
    async fn connect(&self, config: &ConnectionConfig) -> Result<mpsc::Receiver<ChatMessage>, BotError>;

    /// Idempotent.
    async fn disconnect(&self);
}
