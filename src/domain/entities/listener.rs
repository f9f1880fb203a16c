use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::Event;
use crate::application::errors::BotError;

/// Priority assigned to handlers that do not set one
pub const DEFAULT_PRIORITY: i32 = 100;

/// Opaque identity of a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Opaque handle to a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Shared async callback; each invocation receives its own clone of the event
pub type ListenerFn = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<(), BotError>> + Send + Sync>;

/// A listener held by the registry, ordered by (priority, insertion order)
#[derive(Clone)]
pub struct Listener {
    pub id: ListenerId,
    pub event: String,
    pub priority: i32,
    pub owner: ModuleId,
    pub callback: ListenerFn,
}

/// One row of a module's handler table
#[derive(Clone)]
pub struct HandlerDecl {
    pub event: String,
    pub priority: i32,
    pub callback: ListenerFn,
}

impl HandlerDecl {
    pub fn new<F, Fut>(event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        Self {
            event: event.into(),
            priority: DEFAULT_PRIORITY,
            callback: Arc::new(move |event| Box::pin(handler(event))),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
