//! Twitch chat bot: relay connection, command replies and timed broadcasts.

pub mod domain;
pub mod application;
pub mod infrastructure;
