//! Usage counters backed by the module's storage namespace

use crate::application::errors::BotError;
use crate::domain::entities::{Event, HandlerDecl};
use crate::domain::traits::Module;
use crate::infrastructure::storage::Store;

/// Counts incoming messages and remembers the last start time.
/// With durable storage the counters survive restarts.
pub struct StatsModule {
    store: Store,
}

impl StatsModule {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    async fn on_message(store: Store, _event: Event) -> Result<(), BotError> {
        store.inc("messages-received").await?;
        Ok(())
    }

    async fn on_start(store: Store, event: Event) -> Result<(), BotError> {
        store.put("last-start", &event.at).await?;
        store.inc("starts").await?;
        Ok(())
    }
}

impl Module for StatsModule {
    fn name(&self) -> &str {
        "stats"
    }

    fn handlers(&self) -> Vec<HandlerDecl> {
        let message_store = self.store.clone();
        let start_store = self.store.clone();
        vec![
            HandlerDecl::new("message", move |event| {
                Self::on_message(message_store.clone(), event)
            }),
            HandlerDecl::new("start", move |event| {
                Self::on_start(start_store.clone(), event)
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::events::{EventDispatcher, ListenerRegistry};
    use crate::application::services::ModuleService;
    use crate::infrastructure::storage::StorageProvider;

    #[tokio::test]
    async fn counts_messages_in_its_namespace() {
        let provider = StorageProvider::in_memory();
        let registry = Arc::new(ListenerRegistry::new());
        let dispatcher = EventDispatcher::new(registry.clone());
        let mut service = ModuleService::new(registry);

        let store = provider.namespaced("stats");
        service
            .load(Arc::new(StatsModule::new(store.clone())))
            .unwrap();

        for text in ["one", "two", "three"] {
            dispatcher.dispatch(Event::message("console", text)).await;
        }
        dispatcher.dispatch(Event::bare("start")).await;

        assert_eq!(store.get::<i64>("messages-received").await.unwrap(), Some(3));
        assert_eq!(store.get::<i64>("starts").await.unwrap(), Some(1));
        assert!(store.has("last-start").await.unwrap());
    }
}
