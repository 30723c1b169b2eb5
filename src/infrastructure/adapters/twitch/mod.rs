//! Twitch relay adapter - connection lifecycle, receive loop, outbound writer

pub mod line_buffer;
pub mod protocol;

use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::errors::BotError;
use crate::application::events::{BotEvent, EventBus};
use crate::application::messaging::MessageParser;
use crate::domain::entities::{ChatEvent, ChatMessage, ConnectionConfig, ConnectionState};
use crate::domain::traits::{ChatSender, Relay};

pub use line_buffer::LineBuffer;

const READ_CHUNK: usize = 4096;
const INBOUND_CAPACITY: usize = 256;

/// Where the relay lives
#[derive(Debug, Clone)]
pub struct RelayEndpoint {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for RelayEndpoint {
    fn default() -> Self {
        Self {
            host: protocol::DEFAULT_HOST.to_string(),
            port: protocol::DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// State shared with the background tasks
struct Shared {
    state: RwLock<ConnectionState>,
    events: EventBus,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == next {
            return;
        }
        *state = next;
        drop(state);
        tracing::debug!("Connection state: {}", next);
        self.events.publish(BotEvent::ConnectionChanged { state: next });
    }
}

struct Outbound {
    channel: String,
    lines: mpsc::UnboundedSender<String>,
}

struct Session {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Session {
    async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in [("receive loop", self.reader), ("writer", self.writer)] {
            if let Err(e) = handle.await {
                tracing::error!("Relay {} ended abnormally: {}", name, e);
            }
        }
    }
}

/// Owns the relay transport for a single channel
pub struct ConnectionManager {
    endpoint: RelayEndpoint,
    parser: MessageParser,
    shared: Arc<Shared>,
    outbound: Mutex<Option<Outbound>>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl ConnectionManager {
    pub fn new(endpoint: RelayEndpoint, events: EventBus) -> Self {
        Self {
            endpoint,
            parser: MessageParser::new(),
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Disconnected),
                events,
            }),
            outbound: Mutex::new(None),
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Open the transport, log in, join the channel and start the receive
    /// loop. Chat messages arrive on the returned channel, which closes when
    /// the session ends.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<mpsc::Receiver<ChatMessage>, BotError> {
        if !config.is_complete() {
            return Err(BotError::InvalidInput(
                "token and channel are required".to_string(),
            ));
        }

        let mut session = self.session.lock().await;
        if self.state() != ConnectionState::Disconnected {
            return Err(BotError::Connection("already connected".to_string()));
        }
        // Leftovers of a session the relay dropped
        if let Some(stale) = session.take() {
            stale.shutdown().await;
        }

        let channel = config.normalized_channel();
        self.shared.set_state(ConnectionState::Connecting);
        let stream = match self.open(config, &channel).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Connection to {}:{} failed: {}", self.endpoint.host, self.endpoint.port, e);
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let (read_half, write_half) = stream.into_split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);
        let cancel = CancellationToken::new();

        *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(Outbound {
            channel: channel.clone(),
            lines: out_tx.clone(),
        });
        self.shared.set_state(ConnectionState::Connected);

        let writer = tokio::spawn(write_loop(write_half, out_rx, cancel.clone()));
        let reader = tokio::spawn(
            ReceiveLoop {
                parser: self.parser,
                shared: self.shared.clone(),
                pong: out_tx,
                inbound: in_tx,
                cancel: cancel.clone(),
            }
            .run(read_half),
        );
        *session = Some(Session { cancel, reader, writer });

        tracing::info!("Connected to #{}", channel);
        Ok(in_rx)
    }

    async fn open(&self, config: &ConnectionConfig, channel: &str) -> Result<TcpStream, BotError> {
        let address = (self.endpoint.host.as_str(), self.endpoint.port);
        let mut stream = tokio::time::timeout(self.endpoint.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| BotError::Connection("connect timed out".to_string()))?
            .map_err(|e| BotError::Connection(e.to_string()))?;

        let login = [
            protocol::pass(&config.normalized_token()),
            protocol::nick(channel),
            protocol::join(channel),
        ];
        for line in &login {
            stream
                .write_all(line.as_bytes())
                .await
                .map_err(|e| BotError::Connection(format!("login failed: {}", e)))?;
        }
        Ok(stream)
    }

    /// Close the session. Safe to call in any state.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        let was = self.state();
        self.outbound.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.shared.set_state(ConnectionState::Disconnected);

        if let Some(session) = session {
            session.shutdown().await;
        }
        if was != ConnectionState::Disconnected {
            tracing::info!("Disconnected from relay");
        }
    }
}

#[async_trait]
impl ChatSender for ConnectionManager {
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    async fn send(&self, text: &str) -> Result<(), BotError> {
        if !self.is_connected() {
            tracing::warn!("Not connected, dropping message: {}", text);
            return Err(BotError::Connection("not connected".to_string()));
        }
        let outbound = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        let Some(outbound) = outbound.as_ref() else {
            tracing::warn!("No active session, dropping message: {}", text);
            return Err(BotError::Connection("not connected".to_string()));
        };

        let line = protocol::privmsg(&outbound.channel, text);
        tracing::debug!("> {}", line.trim_end());
        outbound
            .lines
            .send(line)
            .map_err(|_| BotError::Connection("writer closed".to_string()))
    }
}

#[async_trait]
impl Relay for ConnectionManager {
    fn state(&self) -> ConnectionState {
        ConnectionManager::state(self)
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<mpsc::Receiver<ChatMessage>, BotError> {
        ConnectionManager::connect(self, config).await
    }

    async fn disconnect(&self) {
        ConnectionManager::disconnect(self).await
    }
}

/// Single writer for the transport. Write failures end the task; they are
/// logged here and never reach the senders.
async fn write_loop(mut writer: OwnedWriteHalf, mut lines: mpsc::UnboundedReceiver<String>, cancel: CancellationToken) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else { break };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            tracing::error!("Write to relay failed: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

struct ReceiveLoop {
    parser: MessageParser,
    shared: Arc<Shared>,
    pong: mpsc::UnboundedSender<String>,
    inbound: mpsc::Sender<ChatMessage>,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    async fn run(self, mut reader: OwnedReadHalf) {
        let mut buffer = LineBuffer::new();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => break,
                read = reader.read(&mut chunk) => read,
            };
            match read {
                Ok(0) => {
                    if self.shared.state() == ConnectionState::Connected {
                        tracing::warn!("Relay closed the connection");
                    }
                    self.shared.set_state(ConnectionState::Disconnected);
                    break;
                }
                Ok(n) => {
                    for line in buffer.push(&chunk[..n]) {
                        self.handle_line(&line);
                    }
                }
                Err(e) => {
                    if self.shared.state() == ConnectionState::Connected {
                        tracing::error!("Read from relay failed: {}", e);
                    }
                    self.shared.set_state(ConnectionState::Disconnected);
                    break;
                }
            }
        }
        self.cancel.cancel();
        tracing::debug!("Receive loop exited");
    }

    fn handle_line(&self, line: &str) {
        let event = match self.parser.parse(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Discarding line: {}", e);
                return;
            }
        };
        tracing::debug!(kind = event.kind(), "< {}", line);

        match event {
            ChatEvent::Ping { payload } => {
                if self.pong.send(protocol::pong(payload.as_deref())).is_ok() {
                    tracing::debug!("PONG queued");
                }
            }
            // Never wait on the dispatcher; the next line may be a PING
            ChatEvent::ChatMessage(message) => match self.inbound.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(message)) => {
                    tracing::warn!("Dispatcher is behind, dropping message from {}", message.sender);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("No dispatcher attached, chat message dropped");
                }
            },
            ChatEvent::Other(_) => {}
        }
    }
}
