//! Platform adapters

pub mod console;
pub mod twitch;
