//! Module service - handles module lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::application::errors::BotError;
use crate::application::events::ListenerRegistry;
use crate::domain::entities::{ListenerId, ModuleId};
use crate::domain::traits::Module;

/// Loads and unloads modules, owning the name -> identity lookup table
pub struct ModuleService {
    registry: Arc<ListenerRegistry>,
    modules: HashMap<String, LoadedModule>,
    next_id: u64,
}

struct LoadedModule {
    id: ModuleId,
    module: Arc<dyn Module>,
    listeners: Vec<ListenerId>,
}

impl ModuleService {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self {
            registry,
            modules: HashMap::new(),
            next_id: 1,
        }
    }

    /// Load a module, registering its whole handler table atomically.
    /// A failed registration leaves the registry untouched.
    pub fn load(&mut self, module: Arc<dyn Module>) -> Result<ModuleId, BotError> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(BotError::Module(format!("Module '{}' already loaded", name)));
        }

        let id = ModuleId::new(self.next_id);
        self.next_id += 1;

        let listeners = self.registry.register_all(id, module.handlers())?;
        info!("Loaded module: {} ({} listener(s))", name, listeners.len());
        self.modules.insert(
            name,
            LoadedModule {
                id,
                module,
                listeners,
            },
        );
        Ok(id)
    }

    /// Unload a module and remove every listener it registered
    pub fn unload(&mut self, name: &str) -> Result<(), BotError> {
        if let Some(loaded) = self.modules.remove(name) {
            self.registry.unregister_all(loaded.id)?;
            info!(
                "Unloaded module: {} ({} listener(s))",
                name,
                loaded.listeners.len()
            );
            Ok(())
        } else {
            Err(BotError::Module(format!("Module '{}' not found", name)))
        }
    }

    /// Get a loaded module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).map(|loaded| loaded.module.clone())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Names of all loaded modules
    pub fn names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
