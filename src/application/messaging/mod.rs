//! Message handling - Line parsing and command dispatch

pub mod dispatcher;
pub mod parser;

pub use dispatcher::CommandDispatcher;
pub use parser::MessageParser;
