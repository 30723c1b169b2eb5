//! Application services - Business logic orchestration

pub mod auto_message_service;
pub mod bot_service;
pub mod command_service;
pub mod scheduler;

pub use auto_message_service::{AutoMessageService, AutoMessageUpdate};
pub use bot_service::BotService;
pub use command_service::CommandService;
pub use scheduler::AutoMessageScheduler;
