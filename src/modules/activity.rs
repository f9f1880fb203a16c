//! Event activity log running ahead of feature handlers

use tracing::debug;

use crate::application::errors::BotError;
use crate::domain::entities::{Event, HandlerDecl};
use crate::domain::traits::Module;
use crate::infrastructure::storage::Store;

/// Runs before default-priority handlers
const LOG_PRIORITY: i32 = 10;

/// Logs chat events and keeps per-event counters
pub struct ActivityModule {
    store: Store,
}

impl ActivityModule {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    async fn record(store: Store, event: Event) -> Result<(), BotError> {
        debug!("Observed event '{}'", event.name);
        store.inc(&format!("count.{}", event.name)).await?;
        store.put("last-event", &event.name).await?;
        Ok(())
    }
}

impl Module for ActivityModule {
    fn name(&self) -> &str {
        "activity"
    }

    fn handlers(&self) -> Vec<HandlerDecl> {
        let observe = |event: &str| {
            let store = self.store.clone();
            HandlerDecl::new(event, move |ev| Self::record(store.clone(), ev))
                .with_priority(LOG_PRIORITY)
        };
        vec![observe("message"), observe("message_edit")]
    }
}
