//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Document persistence
//! - Adapters: Relay connection (Twitch) and console output

pub mod config;
pub mod storage;
pub mod adapters;
