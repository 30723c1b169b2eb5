//! Console adapter - prints bot events for the CLI operator

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::application::events::{BotEvent, EventBus, SchedulerState};

/// Renders domain events as console lines
pub struct ConsoleAdapter {
    events: EventBus,
}

impl ConsoleAdapter {
    pub fn new(events: EventBus) -> Self {
        Self { events }
    }

    /// Subscribe and print until the bus is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Some(line) = render(&event) {
                            println!("{}", line);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Console fell behind, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// One console line per event; registry refreshes print nothing.
pub fn render(event: &BotEvent) -> Option<String> {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    let body = match event {
        BotEvent::ConnectionChanged { state } => format!("[STATUS] connection {}", state),
        BotEvent::ChatReceived { sender, text } => format!("{}: {}", sender, text),
        BotEvent::CommandAnswered { command, response } => format!("[BOT] !{} -> {}", command, response),
        BotEvent::AutoMessageSent { text, .. } => format!("[AUTO] {}", text),
        BotEvent::SchedulerChanged { state } => match state {
            SchedulerState::Running => "[STATUS] auto-messages running".to_string(),
            SchedulerState::Stopped => "[STATUS] auto-messages stopped".to_string(),
        },
        BotEvent::CommandsChanged | BotEvent::AutoMessagesChanged => return None,
    };
    Some(format!("[{}] {}", timestamp, body))
}
