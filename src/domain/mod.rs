//! Domain layer - Core business objects
//! 
//! This layer contains:
//! - Entities: Commands, auto-messages, chat events, connection settings
//! - Traits: Abstractions for infrastructure (ChatSender, Store)

pub mod entities;
pub mod traits;
