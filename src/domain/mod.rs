//! Domain layer - Core business logic with no external dependencies
//!
//! This layer contains:
//! - Entities: Core business objects (Event, Listener, HandlerDecl)
//! - Traits: Abstractions for module implementations (Module)

pub mod entities;
pub mod traits;
