//! Message dispatcher - Routes chat commands to canned replies

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::application::events::{BotEvent, EventBus};
use crate::application::services::CommandService;
use crate::domain::entities::{ChatMessage, DEFAULT_COMMAND};
use crate::domain::traits::ChatSender;

/// Reacts to chat messages using the command registry
pub struct CommandDispatcher {
    commands: Arc<CommandService>,
    sender: Arc<dyn ChatSender>,
    events: EventBus,
}

impl CommandDispatcher {
    pub fn new(commands: Arc<CommandService>, sender: Arc<dyn ChatSender>, events: EventBus) -> Self {
        Self {
            commands,
            sender,
            events,
        }
    }

    /// Handle one chat message. Returns the reply that was sent, if any.
    pub async fn on_chat_message(&self, message: &ChatMessage) -> Option<String> {
        tracing::info!("{}: {}", message.sender, message.text);
        self.events.publish(BotEvent::ChatReceived {
            sender: message.sender.clone(),
            text: message.text.clone(),
        });

        let token = message.command_token()?;
        tracing::debug!("Command detected: '{}'", token);

        let response = if token == DEFAULT_COMMAND {
            self.commands.list().await
        } else {
            match self.commands.get(&token).await {
                Ok(command) => command.response,
                Err(_) => {
                    tracing::debug!("Command '{}' not found", token);
                    return None;
                }
            }
        };

        if let Err(e) = self.sender.send(&response).await {
            tracing::warn!("Reply to !{} not sent: {}", token, e);
            return None;
        }

        if let Err(e) = self.commands.record_usage(&token).await {
            tracing::warn!("Usage for !{} not recorded: {}", token, e);
        }
        tracing::info!("Answered !{}: {}", token, response);
        self.events.publish(BotEvent::CommandAnswered {
            command: token,
            response: response.clone(),
        });
        Some(response)
    }

    /// Consume chat messages until the receive loop closes the channel.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<ChatMessage>) -> Result<(), BotError> {
        while let Some(message) = inbound.recv().await {
            self.on_chat_message(&message).await;
        }
        tracing::debug!("Dispatcher stopped: inbound channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::messaging::MessageParser;
    use crate::domain::entities::ChatEvent;
    use crate::infrastructure::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<String>>,
        offline: bool,
    }

    #[async_trait]
    impl ChatSender for RecordingSender {
        fn is_connected(&self) -> bool {
            !self.offline
        }

        async fn send(&self, text: &str) -> Result<(), BotError> {
            if self.offline {
                return Err(BotError::Connection("not connected".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn setup(sender: Arc<RecordingSender>) -> (CommandDispatcher, Arc<CommandService>) {
        let events = EventBus::default();
        let commands = Arc::new(CommandService::load(Arc::new(MemoryStore::new()), events.clone()).await);
        let dispatcher = CommandDispatcher::new(commands.clone(), sender, events);
        (dispatcher, commands)
    }

    #[tokio::test]
    async fn commands_lists_sorted_names() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, commands) = setup(sender.clone()).await;
        commands.upsert("socials", "x").await.unwrap();
        commands.upsert("discord", "y").await.unwrap();

        let event = MessageParser::new()
            .parse(":user!user@host PRIVMSG #channel :!commands")
            .unwrap();
        let ChatEvent::ChatMessage(message) = event else {
            panic!("expected chat message");
        };
        dispatcher.on_chat_message(&message).await;

        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec!["Available commands: !commands, !discord, !socials".to_string()]
        );
        assert_eq!(commands.get("commands").await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn known_command_replies_and_counts() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, commands) = setup(sender.clone()).await;
        commands.upsert("discord", "discord.gg/abc").await.unwrap();

        let reply = dispatcher
            .on_chat_message(&ChatMessage::new("viewer", "!DISCORD now please"))
            .await;

        assert_eq!(reply.as_deref(), Some("discord.gg/abc"));
        assert_eq!(commands.get("discord").await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn unknown_command_is_silent() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, commands) = setup(sender.clone()).await;
        let before = commands.all().await;

        let reply = dispatcher
            .on_chat_message(&ChatMessage::new("viewer", "!doesnotexist"))
            .await;

        assert!(reply.is_none());
        assert!(sender.sent.lock().unwrap().is_empty());
        assert_eq!(commands.all().await, before);
    }

    #[tokio::test]
    async fn plain_chat_is_ignored() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, _) = setup(sender.clone()).await;

        assert!(dispatcher.on_chat_message(&ChatMessage::new("v", "hello")).await.is_none());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_sender_leaves_usage_untouched() {
        let sender = Arc::new(RecordingSender {
            offline: true,
            ..Default::default()
        });
        let (dispatcher, commands) = setup(sender).await;
        commands.upsert("hi", "hello").await.unwrap();

        assert!(dispatcher.on_chat_message(&ChatMessage::new("v", "!hi")).await.is_none());
        assert_eq!(commands.get("hi").await.unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let sender = Arc::new(RecordingSender::default());
        let (dispatcher, _) = setup(sender.clone()).await;
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(Arc::new(dispatcher).run(rx));
        tx.send(ChatMessage::new("a", "!commands")).await.unwrap();
        tx.send(ChatMessage::new("b", "!commands")).await.unwrap();
        drop(tx);

        handle.await.unwrap().unwrap();
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }
}
