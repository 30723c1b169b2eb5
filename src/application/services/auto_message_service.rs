use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::errors::BotError;
use crate::application::events::{BotEvent, EventBus};
use crate::domain::entities::{AutoMessage, AutoMessageRecord};
use crate::domain::traits::{decode_entries, Store};

/// Name of the persisted document holding the auto-messages.
pub const AUTO_MESSAGES_DOCUMENT: &str = "auto_messages";

/// Partial update applied by [`AutoMessageService::edit`]
#[derive(Debug, Clone, Default)]
pub struct AutoMessageUpdate {
    pub text: Option<String>,
    pub interval_minutes: Option<u32>,
    pub enabled: Option<bool>,
}

/// Service for the operator-managed auto-message collection
pub struct AutoMessageService {
    messages: Mutex<BTreeMap<String, AutoMessage>>,
    store: Arc<dyn Store>,
    events: EventBus,
}

impl AutoMessageService {
    pub async fn load(store: Arc<dyn Store>, events: EventBus) -> Self {
        let document = store.load(AUTO_MESSAGES_DOCUMENT).await;
        let records: BTreeMap<String, AutoMessageRecord> = decode_entries(document, "auto-message");

        let messages: BTreeMap<String, AutoMessage> = records
            .into_iter()
            .map(|(id, record)| (id.clone(), AutoMessage::from_record(id, record)))
            .collect();
        tracing::info!("Loaded {} auto-messages", messages.len());

        Self {
            messages: Mutex::new(messages),
            store,
            events,
        }
    }

    pub async fn add(&self, text: &str, interval_minutes: u32, enabled: bool) -> Result<AutoMessage, BotError> {
        let text = validate_text(text)?;
        validate_interval(interval_minutes)?;

        let message = AutoMessage::new(text, interval_minutes).with_enabled(enabled);
        let mut messages = self.messages.lock().await;
        messages.insert(message.id.clone(), message.clone());
        tracing::info!("Auto-message {} added", message.id);

        self.persist(&messages).await;
        self.events.publish(BotEvent::AutoMessagesChanged);
        Ok(message)
    }

    /// Edit text, interval or enabled flag. The id and the send statistics
    /// are kept.
    pub async fn edit(&self, id: &str, update: AutoMessageUpdate) -> Result<AutoMessage, BotError> {
        let text = update.text.as_deref().map(validate_text).transpose()?;
        if let Some(interval) = update.interval_minutes {
            validate_interval(interval)?;
        }

        let mut messages = self.messages.lock().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| BotError::NotFound(format!("auto-message {}", id)))?;
        if let Some(text) = text {
            message.text = text.to_string();
        }
        if let Some(interval) = update.interval_minutes {
            message.interval_minutes = interval;
        }
        if let Some(enabled) = update.enabled {
            message.enabled = enabled;
        }
        let edited = message.clone();
        tracing::info!("Auto-message {} updated", id);

        self.persist(&messages).await;
        self.events.publish(BotEvent::AutoMessagesChanged);
        Ok(edited)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<AutoMessage, BotError> {
        self.edit(
            id,
            AutoMessageUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn remove(&self, id: &str) -> Result<AutoMessage, BotError> {
        let mut messages = self.messages.lock().await;
        let removed = messages
            .remove(id)
            .ok_or_else(|| BotError::NotFound(format!("auto-message {}", id)))?;
        tracing::info!("Auto-message {} removed", id);

        self.persist(&messages).await;
        self.events.publish(BotEvent::AutoMessagesChanged);
        Ok(removed)
    }

    pub async fn get(&self, id: &str) -> Option<AutoMessage> {
        self.messages.lock().await.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<AutoMessage> {
        self.messages.lock().await.values().cloned().collect()
    }

    pub async fn enabled_count(&self) -> usize {
        self.messages.lock().await.values().filter(|m| m.enabled).count()
    }

    /// Messages eligible for broadcast at `now`.
    pub async fn due(&self, now: f64) -> Vec<AutoMessage> {
        self.messages
            .lock()
            .await
            .values()
            .filter(|m| m.is_due(now))
            .cloned()
            .collect()
    }

    /// Record a broadcast: `last_sent = now`, `sent_count += 1`, persisted
    /// under one lock acquisition.
    pub async fn mark_sent(&self, id: &str, now: f64) -> Result<AutoMessage, BotError> {
        let mut messages = self.messages.lock().await;
        let message = messages
            .get_mut(id)
            .ok_or_else(|| BotError::NotFound(format!("auto-message {}", id)))?;
        message.mark_sent(now);
        let sent = message.clone();

        self.persist(&messages).await;
        self.events.publish(BotEvent::AutoMessagesChanged);
        Ok(sent)
    }

    async fn persist(&self, messages: &BTreeMap<String, AutoMessage>) {
        let records: BTreeMap<&String, AutoMessageRecord> =
            messages.iter().map(|(id, m)| (id, m.to_record())).collect();
        let document = match serde_json::to_value(records) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Failed to serialize auto-messages: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(AUTO_MESSAGES_DOCUMENT, &document).await {
            tracing::error!("Failed to save auto-messages: {}", e);
        }
    }
}

fn validate_text(text: &str) -> Result<&str, BotError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(BotError::InvalidInput("auto-message text is empty".to_string()));
    }
    Ok(text)
}

fn validate_interval(interval_minutes: u32) -> Result<(), BotError> {
    if interval_minutes < 1 {
        return Err(BotError::InvalidInput(
            "interval must be at least 1 minute".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryStore;

    async fn service() -> (AutoMessageService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = AutoMessageService::load(store.clone(), EventBus::default()).await;
        (service, store)
    }

    #[tokio::test]
    async fn add_validates_input() {
        let (service, _) = service().await;
        assert!(matches!(service.add(" ", 5, true).await, Err(BotError::InvalidInput(_))));
        assert!(matches!(service.add("hi", 0, true).await, Err(BotError::InvalidInput(_))));
        assert!(service.all().await.is_empty());
    }

    #[tokio::test]
    async fn edit_keeps_id_and_statistics() {
        let (service, _) = service().await;
        let added = service.add("follow the channel", 5, true).await.unwrap();
        service.mark_sent(&added.id, 1_000.0).await.unwrap();

        let edited = service
            .edit(
                &added.id,
                AutoMessageUpdate {
                    text: Some("join the discord".into()),
                    interval_minutes: Some(10),
                    enabled: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.id, added.id);
        assert_eq!(edited.text, "join the discord");
        assert_eq!(edited.interval_minutes, 10);
        assert_eq!(edited.sent_count, 1);
        assert_eq!(edited.last_sent, 1_000.0);
    }

    #[tokio::test]
    async fn mark_sent_persists_document_shape() {
        let (service, store) = service().await;
        let added = service.add("hello chat", 2, true).await.unwrap();

        service.mark_sent(&added.id, 500.0).await.unwrap();

        let doc = store.snapshot(AUTO_MESSAGES_DOCUMENT).await.unwrap();
        let entry = &doc[added.id.as_str()];
        assert_eq!(entry["message"], "hello chat");
        assert_eq!(entry["interval"], 2);
        assert_eq!(entry["enabled"], true);
        assert_eq!(entry["sent_count"], 1);
        assert_eq!(entry["last_sent"], 500.0);
    }

    #[tokio::test]
    async fn due_filters_disabled_and_recent() {
        let (service, _) = service().await;
        let a = service.add("a", 1, true).await.unwrap();
        service.add("b", 1, false).await.unwrap();
        let c = service.add("c", 1, true).await.unwrap();
        service.mark_sent(&c.id, 100.0).await.unwrap();

        let due: Vec<String> = service.due(130.0).await.into_iter().map(|m| m.id).collect();
        assert_eq!(due, vec![a.id]);
        assert_eq!(service.enabled_count().await, 2);
    }

    #[tokio::test]
    async fn toggle_and_remove() {
        let (service, _) = service().await;
        let added = service.add("x", 3, true).await.unwrap();

        service.set_enabled(&added.id, false).await.unwrap();
        assert_eq!(service.enabled_count().await, 0);

        service.remove(&added.id).await.unwrap();
        assert!(matches!(service.remove(&added.id).await, Err(BotError::NotFound(_))));
    }

    #[tokio::test]
    async fn loads_legacy_ids() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(
                AUTO_MESSAGES_DOCUMENT,
                &serde_json::json!({
                    "1700000000": { "message": "hi", "interval": 15, "enabled": false, "sent_count": 9, "last_sent": 0 }
                }),
            )
            .await
            .unwrap();

        let service = AutoMessageService::load(store, EventBus::default()).await;
        let msg = service.get("1700000000").await.unwrap();
        assert_eq!(msg.interval_minutes, 15);
        assert_eq!(msg.sent_count, 9);
        assert!(!msg.enabled);
    }

    #[tokio::test]
    async fn bad_entry_does_not_erase_the_rest() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(
                AUTO_MESSAGES_DOCUMENT,
                &serde_json::json!({
                    "a": { "message": "follow!", "interval": 10 },
                    "b": { "interval": "soon" },
                    "c": { "message": "discord", "enabled": false }
                }),
            )
            .await
            .unwrap();

        let service = AutoMessageService::load(store, EventBus::default()).await;
        let ids: Vec<String> = service.all().await.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(service.get("c").await.unwrap().interval_minutes, 5);
    }
}
