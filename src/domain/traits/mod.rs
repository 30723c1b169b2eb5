//! Domain traits - Abstractions for infrastructure implementations

pub mod sender;
pub mod store;

pub use sender::{ChatSender, Relay};
pub use store::{decode_entries, empty_document, Document, Store};
