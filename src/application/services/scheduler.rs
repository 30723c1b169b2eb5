use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::errors::BotError;
use crate::application::events::{BotEvent, EventBus, SchedulerState};
use crate::application::services::AutoMessageService;
use crate::domain::traits::ChatSender;

/// Default poll cadence of the broadcast loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodically broadcasts enabled auto-messages whose interval elapsed
pub struct AutoMessageScheduler {
    messages: Arc<AutoMessageService>,
    sender: Arc<dyn ChatSender>,
    events: EventBus,
    poll_interval: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl AutoMessageScheduler {
    pub fn new(messages: Arc<AutoMessageService>, sender: Arc<dyn ChatSender>, events: EventBus) -> Self {
        Self {
            messages,
            sender,
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
            running: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn state(&self) -> SchedulerState {
        match self.running.lock().await.as_ref() {
            Some(running) if !running.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Start the broadcast loop. Requires a live connection and at least one
    /// enabled message. Starting a running scheduler is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), BotError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::debug!("Auto-messages already running");
            return Ok(());
        }
        if !self.sender.is_connected() {
            return Err(BotError::Precondition(
                "connect to the relay before starting auto-messages".to_string(),
            ));
        }
        if self.messages.enabled_count().await == 0 {
            return Err(BotError::Precondition(
                "add at least one enabled auto-message first".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run(cancel.clone()));
        *running = Some(RunningLoop { cancel, handle });

        tracing::info!("Auto-messages started (poll every {:?})", self.poll_interval);
        self.events.publish(BotEvent::SchedulerChanged {
            state: SchedulerState::Running,
        });
        Ok(())
    }

    /// Stop the loop and wait for it to exit. Idempotent.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::error!("Auto-message loop ended abnormally: {}", e);
        }

        tracing::info!("Auto-messages stopped");
        self.events.publish(BotEvent::SchedulerChanged {
            state: SchedulerState::Stopped,
        });
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle(now_epoch(), &cancel).await;
                }
            }
        }
        tracing::debug!("Auto-message loop exited");
    }

    /// Evaluate every enabled message once. Returns how many were sent.
    pub async fn run_cycle(&self, now: f64, cancel: &CancellationToken) -> usize {
        let mut sent = 0;
        for message in self.messages.due(now).await {
            if cancel.is_cancelled() {
                break;
            }
            if !self.sender.is_connected() {
                tracing::debug!("Skipping auto-messages: not connected");
                break;
            }
            if let Err(e) = self.sender.send(&message.text).await {
                tracing::warn!("Auto-message {} not sent: {}", message.id, e);
                continue;
            }
            match self.messages.mark_sent(&message.id, now).await {
                Ok(_) => {
                    sent += 1;
                    let preview: String = message.text.chars().take(50).collect();
                    tracing::info!("Auto-message sent: {}", preview);
                    self.events.publish(BotEvent::AutoMessageSent {
                        id: message.id.clone(),
                        text: message.text.clone(),
                    });
                }
                Err(e) => tracing::warn!("Auto-message {} not recorded: {}", message.id, e),
            }
        }
        sent
    }
}

/// Current Unix time in seconds.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakySender {
        connected: AtomicBool,
        fail_on: Option<String>,
        sent: std::sync::Mutex<Vec<String>>,
    }

    impl FlakySender {
        fn new() -> Self {
            Self {
                connected: AtomicBool::new(true),
                fail_on: None,
                sent: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatSender for FlakySender {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn send(&self, text: &str) -> Result<(), BotError> {
            if self.fail_on.as_deref() == Some(text) {
                return Err(BotError::Connection("broken pipe".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn setup(sender: Arc<FlakySender>) -> (Arc<AutoMessageScheduler>, Arc<AutoMessageService>) {
        let events = EventBus::default();
        let messages = Arc::new(AutoMessageService::load(Arc::new(MemoryStore::new()), events.clone()).await);
        let scheduler = AutoMessageScheduler::new(messages.clone(), sender, events)
            .with_poll_interval(Duration::from_millis(20));
        (Arc::new(scheduler), messages)
    }

    #[tokio::test]
    async fn start_without_enabled_messages_fails() {
        let (scheduler, messages) = setup(Arc::new(FlakySender::new())).await;
        messages.add("off", 1, false).await.unwrap();

        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(err, BotError::Precondition(_)));
        assert_eq!(scheduler.state().await, SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn start_without_connection_fails() {
        let sender = Arc::new(FlakySender::new());
        sender.connected.store(false, Ordering::SeqCst);
        let (scheduler, messages) = setup(sender).await;
        messages.add("on", 1, true).await.unwrap();

        assert!(matches!(scheduler.start().await, Err(BotError::Precondition(_))));
        assert_eq!(scheduler.state().await, SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn cycle_sends_due_messages_once() {
        let sender = Arc::new(FlakySender::new());
        let (scheduler, messages) = setup(sender.clone()).await;
        let msg = messages.add("follow!", 5, true).await.unwrap();
        let cancel = CancellationToken::new();

        assert_eq!(scheduler.run_cycle(10_000.0, &cancel).await, 1);
        assert_eq!(scheduler.run_cycle(10_010.0, &cancel).await, 0);
        assert_eq!(scheduler.run_cycle(10_300.0, &cancel).await, 1);

        let stored = messages.get(&msg.id).await.unwrap();
        assert_eq!(stored.sent_count, 2);
        assert_eq!(stored.last_sent, 10_300.0);
        assert_eq!(sender.sent(), vec!["follow!", "follow!"]);
    }

    #[tokio::test]
    async fn failed_send_does_not_block_others() {
        let mut sender = FlakySender::new();
        sender.fail_on = Some("first".to_string());
        let sender = Arc::new(sender);
        let (scheduler, messages) = setup(sender.clone()).await;
        let first = messages.add("first", 1, true).await.unwrap();
        let second = messages.add("second", 1, true).await.unwrap();

        let sent = scheduler.run_cycle(1_000.0, &CancellationToken::new()).await;

        assert_eq!(sent, 1);
        assert_eq!(messages.get(&first.id).await.unwrap().sent_count, 0);
        assert_eq!(messages.get(&second.id).await.unwrap().sent_count, 1);
    }

    #[tokio::test]
    async fn disconnected_cycle_sends_nothing() {
        let sender = Arc::new(FlakySender::new());
        sender.connected.store(false, Ordering::SeqCst);
        let (scheduler, messages) = setup(sender.clone()).await;
        messages.add("x", 1, true).await.unwrap();

        assert_eq!(scheduler.run_cycle(1_000.0, &CancellationToken::new()).await, 0);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn start_then_stop() {
        let sender = Arc::new(FlakySender::new());
        let (scheduler, messages) = setup(sender.clone()).await;
        messages.add("hello", 1, true).await.unwrap();

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state().await, SchedulerState::Running);

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop().await;
        assert_eq!(scheduler.state().await, SchedulerState::Stopped);

        // First tick fires immediately; the 1-minute interval blocks repeats.
        assert_eq!(sender.sent(), vec!["hello"]);

        let after_stop = sender.sent().len();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sender.sent().len(), after_stop);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (scheduler, _) = setup(Arc::new(FlakySender::new())).await;
        scheduler.stop().await;
        scheduler.stop().await;
        assert_eq!(scheduler.state().await, SchedulerState::Stopped);
    }
}
