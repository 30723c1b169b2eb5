use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::errors::BotError;
use crate::application::events::{BotEvent, EventBus};
use crate::domain::entities::command::normalize_name;
use crate::domain::entities::{Command, CommandRecord, CommandRegistry, DEFAULT_COMMAND};
use crate::domain::traits::{decode_entries, Store};

/// Name of the persisted document holding the registry.
pub const COMMANDS_DOCUMENT: &str = "commands";

/// Service for managing persisted chat commands
pub struct CommandService {
    registry: Mutex<CommandRegistry>,
    store: Arc<dyn Store>,
    events: EventBus,
}

impl CommandService {
    /// Load the registry from the store, seeding the built-in entry.
    pub async fn load(store: Arc<dyn Store>, events: EventBus) -> Self {
        let document = store.load(COMMANDS_DOCUMENT).await;
        let records: BTreeMap<String, CommandRecord> = decode_entries(document, "command");

        let mut registry = CommandRegistry::from_records(records);
        let seeded = registry.ensure_default();
        tracing::info!("Loaded {} commands", registry.len());

        let service = Self {
            registry: Mutex::new(registry),
            store,
            events,
        };
        if seeded {
            let registry = service.registry.lock().await;
            service.persist(&registry).await;
        }
        service
    }

    pub async fn get(&self, name: &str) -> Result<Command, BotError> {
        self.registry
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BotError::NotFound(format!("command !{}", normalize_name(name))))
    }

    /// Increment the usage counter by one and persist.
    pub async fn record_usage(&self, name: &str) -> Result<u64, BotError> {
        let mut registry = self.registry.lock().await;
        let command = registry
            .get_mut(name)
            .ok_or_else(|| BotError::NotFound(format!("command !{}", normalize_name(name))))?;
        command.usage_count += 1;
        let count = command.usage_count;

        self.persist(&registry).await;
        self.events.publish(BotEvent::CommandsChanged);
        Ok(count)
    }

    /// Create a command, or replace the response of an existing one while
    /// keeping its usage counter.
    pub async fn upsert(&self, name: &str, response: &str) -> Result<Command, BotError> {
        let key = normalize_name(name);
        let response = response.trim();
        if key.is_empty() {
            return Err(BotError::InvalidInput("command name is empty".to_string()));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(BotError::InvalidInput(format!(
                "command name '{}' contains whitespace",
                key
            )));
        }
        if response.is_empty() {
            return Err(BotError::InvalidInput("command response is empty".to_string()));
        }
        if key == DEFAULT_COMMAND {
            return Err(BotError::ProtectedCommand(key));
        }

        let mut registry = self.registry.lock().await;
        let command = match registry.get_mut(&key) {
            Some(existing) => {
                existing.response = response.to_string();
                tracing::info!("Command !{} updated", key);
                existing.clone()
            }
            None => {
                let command = Command::new(&key, response);
                registry.register(command.clone());
                tracing::info!("Command !{} added", key);
                command
            }
        };

        self.persist(&registry).await;
        self.events.publish(BotEvent::CommandsChanged);
        Ok(command)
    }

    pub async fn remove(&self, name: &str) -> Result<Command, BotError> {
        let key = normalize_name(name);
        if key == DEFAULT_COMMAND {
            return Err(BotError::ProtectedCommand(key));
        }

        let mut registry = self.registry.lock().await;
        let removed = registry
            .remove(&key)
            .ok_or_else(|| BotError::NotFound(format!("command !{}", key)))?;
        tracing::info!("Command !{} removed", key);

        self.persist(&registry).await;
        self.events.publish(BotEvent::CommandsChanged);
        Ok(removed)
    }

    /// Built-in listing reply.
    pub async fn list(&self) -> String {
        self.registry.lock().await.listing()
    }

    pub async fn all(&self) -> Vec<Command> {
        self.registry.lock().await.all().cloned().collect()
    }

    /// Save failures are logged; memory stays authoritative until the next
    /// successful save.
    async fn persist(&self, registry: &CommandRegistry) {
        let document = match serde_json::to_value(registry.to_records()) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Failed to serialize commands: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(COMMANDS_DOCUMENT, &document).await {
            tracing::error!("Failed to save commands: {}", e);
        }
    }
}
