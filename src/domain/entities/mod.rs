//! Domain entities - Core business objects with no external dependencies

pub mod auto_message;
pub mod command;
pub mod connection;
pub mod message;

pub use auto_message::{AutoMessage, AutoMessageRecord};
pub use command::{Command, CommandRecord, CommandRegistry, DEFAULT_COMMAND};
pub use connection::{ConnectionConfig, ConnectionState};
pub use message::{ChatEvent, ChatMessage};
