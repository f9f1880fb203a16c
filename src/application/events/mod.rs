//! Event handling - listener registry and concurrent dispatch

pub mod dispatcher;
pub mod registry;

pub use dispatcher::EventDispatcher;
pub use registry::ListenerRegistry;
