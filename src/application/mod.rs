//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: Module lifecycle orchestration
//! - Events: Listener registry and dispatch
//! - Errors: Domain-specific errors

pub mod errors;
pub mod events;
pub mod services;
