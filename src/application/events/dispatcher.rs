//! Event dispatcher - concurrent fan-out to registered listeners

use std::sync::Arc;

use tokio::task::JoinSet;

use super::registry::ListenerRegistry;
use crate::domain::entities::Event;

/// Fans events out to the registered listeners; cheap to clone and share
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<ListenerRegistry>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch `event` and wait for every listener to finish.
    ///
    /// The listener set is the one registered at the moment the dispatch
    /// starts; later registry changes affect later dispatches only.
    /// Callbacks are invoked in priority order and run concurrently; a
    /// failing or panicking listener is logged and never affects its
    /// siblings or the caller.
    pub async fn dispatch(&self, event: Event) {
        let listeners = self.registry.listeners_for(&event.name);
        if listeners.is_empty() {
            return;
        }
        tracing::debug!(
            "Dispatching event '{}' to {} listener(s)",
            event.name,
            listeners.len()
        );

        let mut tasks = JoinSet::new();
        for listener in listeners {
            let owner = listener.owner;
            let name = event.name.clone();
            let future = (listener.callback)(event.clone());
            tasks.spawn(async move {
                if let Err(e) = future.await {
                    tracing::warn!("Listener for '{}' owned by {} failed: {}", name, owner, e);
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!("Listener for '{}' panicked: {}", event.name, e);
                }
            }
        }
    }

    /// Fire-and-forget dispatch; returns once the work is scheduled
    pub fn dispatch_nowait(&self, event: Event) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(event).await;
        });
    }
}
