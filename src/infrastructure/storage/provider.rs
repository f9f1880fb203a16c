//! Opens the storage engine and hands out per-module namespaces

use std::path::Path;
use std::sync::Arc;

use super::engine::StorageEngine;
use super::store::Store;
use crate::application::errors::StoreError;

/// Owner of the storage engine; modules get their namespaces from here
pub struct StorageProvider {
    engine: Arc<StorageEngine>,
    root: Store,
}

impl StorageProvider {
    /// Open storage per configuration. No path or an unusable engine fall
    /// back to in-memory mode; a locked or unrepairable database is fatal.
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let engine = Arc::new(StorageEngine::open(path)?);
        if engine.is_fallback() {
            tracing::warn!("Storage is in-memory only - data will NOT persist across restarts");
        } else if let Some(path) = engine.path() {
            tracing::info!("Storage ready at '{}'", path.display());
        }
        let root = Store::root(engine.clone());
        Ok(Self { engine, root })
    }

    /// In-memory provider for tests and ephemeral runs
    pub fn in_memory() -> Self {
        let engine = Arc::new(StorageEngine::in_memory());
        let root = Store::root(engine.clone());
        Self { engine, root }
    }

    /// Store scoped to one namespace; appends the reserved `.` separator
    pub fn namespaced(&self, prefix: &str) -> Store {
        self.root.prefixed(&format!("{prefix}."))
    }

    /// The unprefixed root store
    pub fn root(&self) -> &Store {
        &self.root
    }

    pub fn is_fallback(&self) -> bool {
        self.engine.is_fallback()
    }

    /// Release the engine; outstanding stores keep it alive until dropped
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn namespaces_carry_the_separator() {
        let provider = StorageProvider::in_memory();
        let store = provider.namespaced("stats");
        assert_eq!(store.prefix(), "stats.");

        store.put("k", &1i64).await.unwrap();
        assert_eq!(provider.root().get::<i64>("stats.k").await.unwrap(), Some(1));
    }

    #[test]
    fn open_without_a_path_is_fallback() {
        let provider = StorageProvider::open(None).unwrap();
        assert!(provider.is_fallback());
    }
}
