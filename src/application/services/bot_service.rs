use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::application::errors::BotError;
use crate::application::events::{EventBus, SchedulerState};
use crate::application::messaging::CommandDispatcher;
use crate::application::services::{AutoMessageScheduler, AutoMessageService, CommandService};
use crate::domain::entities::{ConnectionConfig, ConnectionState};
use crate::domain::traits::{ChatSender, Relay, Store};

/// Name of the persisted document holding the connection settings.
pub const CONFIG_DOCUMENT: &str = "config";

/// Control surface over the relay, the command registry and the scheduler.
///
/// Presentation layers call into this and subscribe to [`EventBus`] for
/// display; nothing here depends on how events are rendered.
pub struct BotService<R: Relay> {
    relay: Arc<R>,
    store: Arc<dyn Store>,
    events: EventBus,
    commands: Arc<CommandService>,
    auto_messages: Arc<AutoMessageService>,
    scheduler: Arc<AutoMessageScheduler>,
    dispatcher: Arc<CommandDispatcher>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: Relay + 'static> BotService<R> {
    /// Load the persisted registries and wire the components together.
    pub async fn new(relay: Arc<R>, store: Arc<dyn Store>, events: EventBus, poll_interval: Duration) -> Self {
        let sender: Arc<dyn ChatSender> = relay.clone();
        let commands = Arc::new(CommandService::load(store.clone(), events.clone()).await);
        let auto_messages = Arc::new(AutoMessageService::load(store.clone(), events.clone()).await);
        let scheduler = Arc::new(
            AutoMessageScheduler::new(auto_messages.clone(), sender.clone(), events.clone())
                .with_poll_interval(poll_interval),
        );
        let dispatcher = Arc::new(CommandDispatcher::new(commands.clone(), sender, events.clone()));

        Self {
            relay,
            store,
            events,
            commands,
            auto_messages,
            scheduler,
            dispatcher,
            dispatch_task: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn commands(&self) -> &Arc<CommandService> {
        &self.commands
    }

    pub fn auto_messages(&self) -> &Arc<AutoMessageService> {
        &self.auto_messages
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.relay.state()
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state().await
    }

    /// Stored connection settings; empty when none were saved or the
    /// document is unreadable.
    pub async fn connection_config(&self) -> ConnectionConfig {
        let document = self.store.load(CONFIG_DOCUMENT).await;
        serde_json::from_value(document).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid config document: {}", e);
            ConnectionConfig::default()
        })
    }

    pub async fn save_connection_config(&self, config: &ConnectionConfig) -> Result<(), BotError> {
        let config = ConnectionConfig::new(config.token.trim(), config.normalized_channel());
        let document = serde_json::to_value(&config)
            .map_err(|e| BotError::InvalidInput(e.to_string()))?;
        self.store.save(CONFIG_DOCUMENT, &document).await?;
        tracing::info!("Connection settings saved for #{}", config.channel);
        Ok(())
    }

    /// Connect with `config`, or with the stored settings when `None`, and
    /// start dispatching chat commands.
    pub async fn connect(&self, config: Option<ConnectionConfig>) -> Result<(), BotError> {
        let config = match config {
            Some(config) => config,
            None => self.connection_config().await,
        };

        let mut task = self.dispatch_task.lock().await;
        let inbound = self.relay.connect(&config).await?;
        if let Some(stale) = task.take() {
            stale.abort();
        }
        let dispatcher = self.dispatcher.clone();
        *task = Some(tokio::spawn(async move {
            if let Err(e) = dispatcher.run(inbound).await {
                tracing::error!("Dispatcher failed: {}", e);
            }
        }));
        Ok(())
    }

    /// Stop the scheduler, close the relay session and wait for the
    /// dispatcher to drain.
    pub async fn disconnect(&self) {
        self.scheduler.stop().await;
        self.relay.disconnect().await;
        if let Some(task) = self.dispatch_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::error!("Dispatcher ended abnormally: {}", e);
            }
        }
    }

    pub async fn start_auto_messages(&self) -> Result<(), BotError> {
        self.scheduler.start().await
    }

    pub async fn stop_auto_messages(&self) {
        self.scheduler.stop().await
    }
}
