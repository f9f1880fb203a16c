//! Domain entities - Core business objects with no external dependencies

pub mod event;
pub mod listener;

pub use event::Event;
pub use listener::{HandlerDecl, Listener, ListenerFn, ListenerId, ModuleId, DEFAULT_PRIORITY};
