//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Command registry, auto-messages, scheduler, control surface
//! - Events: Publish/subscribe bus for presentation layers
//! - Errors: Domain-specific errors
//! - Messaging: Line parsing and command dispatch

pub mod errors;
pub mod events;
pub mod services;
pub mod messaging;
