//! Listener registry - priority-ordered event listeners

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::application::errors::RegistryError;
use crate::domain::entities::{HandlerDecl, Listener, ListenerFn, ListenerId, ModuleId};

/// Registry of event listeners, kept sorted by (priority, insertion order)
pub struct ListenerRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    listeners: HashMap<String, Vec<Listener>>,
    next_id: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register one listener; equal priorities keep registration order
    pub fn register(
        &self,
        owner: ModuleId,
        event: impl Into<String>,
        callback: ListenerFn,
        priority: i32,
    ) -> Result<ListenerId, RegistryError> {
        let mut inner = self.write()?;
        inner.insert(owner, event.into(), callback, priority)
    }

    /// Register a module's whole handler table atomically.
    ///
    /// On failure every listener this call inserted is removed again, and
    /// the error names the failing table index.
    pub fn register_all(
        &self,
        owner: ModuleId,
        handlers: Vec<HandlerDecl>,
    ) -> Result<Vec<ListenerId>, RegistryError> {
        let mut inner = self.write()?;
        let mut registered = Vec::with_capacity(handlers.len());
        for (index, decl) in handlers.into_iter().enumerate() {
            match inner.insert(owner, decl.event, decl.callback, decl.priority) {
                Ok(id) => registered.push(id),
                Err(source) => {
                    for id in registered {
                        inner.remove(id);
                    }
                    return Err(RegistryError::Batch {
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(registered)
    }

    /// Remove one listener by handle
    pub fn unregister(&self, id: ListenerId) -> Result<(), RegistryError> {
        let mut inner = self.write()?;
        if inner.remove(id) {
            Ok(())
        } else {
            Err(RegistryError::NotFound)
        }
    }

    /// Remove every listener owned by `owner`; returns how many were removed.
    ///
    /// Matches are collected first, then removed.
    pub fn unregister_all(&self, owner: ModuleId) -> Result<usize, RegistryError> {
        let mut inner = self.write()?;
        let ids: Vec<ListenerId> = inner
            .listeners
            .values()
            .flatten()
            .filter(|listener| listener.owner == owner)
            .map(|listener| listener.id)
            .collect();
        let count = ids.len();
        for id in ids {
            inner.remove(id);
        }
        Ok(count)
    }

    /// Current listeners for an event, best priority first.
    /// Unknown events yield an empty list, never an error.
    pub fn listeners_for(&self, event: &str) -> Vec<Listener> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.listeners.get(event).cloned())
            .unwrap_or_default()
    }

    /// Total number of registered listeners
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .ok()
            .map(|inner| inner.listeners.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, RegistryError> {
        self.inner
            .write()
            .map_err(|_| RegistryError::Internal("Lock poisoned".to_string()))
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn insert(
        &mut self,
        owner: ModuleId,
        event: String,
        callback: ListenerFn,
        priority: i32,
    ) -> Result<ListenerId, RegistryError> {
        let sequence = self.listeners.entry(event.clone()).or_default();
        let duplicate = sequence
            .iter()
            .any(|l| l.owner == owner && Arc::ptr_eq(&l.callback, &callback));
        if duplicate {
            return Err(RegistryError::Duplicate(event));
        }

        let id = ListenerId::new(self.next_id);
        self.next_id += 1;

        // first position whose priority is strictly larger keeps ties FIFO
        let pos = sequence.partition_point(|l| l.priority <= priority);
        sequence.insert(
            pos,
            Listener {
                id,
                event,
                priority,
                owner,
                callback,
            },
        );
        Ok(id)
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let event = self.listeners.iter().find_map(|(event, sequence)| {
            sequence
                .iter()
                .any(|l| l.id == id)
                .then(|| event.clone())
        });
        let Some(event) = event else {
            return false;
        };
        if let Some(sequence) = self.listeners.get_mut(&event) {
            sequence.retain(|l| l.id != id);
            if sequence.is_empty() {
                self.listeners.remove(&event);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DEFAULT_PRIORITY;

    fn noop() -> ListenerFn {
        Arc::new(|_| Box::pin(async { Ok(()) }))
    }

    fn owner(raw: u64) -> ModuleId {
        ModuleId::new(raw)
    }

    #[test]
    fn listeners_stay_sorted_by_priority() {
        let registry = ListenerRegistry::new();
        let m = owner(1);
        let late = registry.register(m, "message", noop(), 50).unwrap();
        let first = registry.register(m, "message", noop(), 10).unwrap();
        let last = registry.register(m, "message", noop(), DEFAULT_PRIORITY).unwrap();

        let order: Vec<ListenerId> = registry
            .listeners_for("message")
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(order, vec![first, late, last]);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let registry = ListenerRegistry::new();
        let m = owner(1);
        let a = registry.register(m, "message", noop(), 50).unwrap();
        let b = registry.register(m, "message", noop(), 50).unwrap();
        let c = registry.register(m, "message", noop(), 50).unwrap();

        let order: Vec<ListenerId> = registry
            .listeners_for("message")
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let registry = ListenerRegistry::new();
        let m = owner(1);
        let callback = noop();
        registry.register(m, "message", callback.clone(), 50).unwrap();

        let err = registry.register(m, "message", callback.clone(), 80);
        assert!(matches!(err, Err(RegistryError::Duplicate(event)) if event == "message"));

        // same callback from a different owner is a different identity
        registry.register(owner(2), "message", callback.clone(), 50).unwrap();
        // and the same callback on a different event too
        registry.register(m, "message_edit", callback, 50).unwrap();
    }

    #[test]
    fn unknown_events_yield_an_empty_list() {
        let registry = ListenerRegistry::new();
        assert!(registry.listeners_for("nothing").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_removes_exactly_one() {
        let registry = ListenerRegistry::new();
        let m = owner(1);
        let id = registry.register(m, "message", noop(), 50).unwrap();
        let other = registry.register(m, "message", noop(), 60).unwrap();

        registry.unregister(id).unwrap();
        let remaining: Vec<ListenerId> = registry
            .listeners_for("message")
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(remaining, vec![other]);

        assert!(matches!(
            registry.unregister(id),
            Err(RegistryError::NotFound)
        ));
    }

    #[test]
    fn unregister_all_is_scoped_to_the_owner() {
        let registry = ListenerRegistry::new();
        let mine = owner(1);
        let theirs = owner(2);
        registry.register(mine, "message", noop(), 50).unwrap();
        registry.register(mine, "message_edit", noop(), 50).unwrap();
        registry.register(theirs, "message", noop(), 50).unwrap();

        assert_eq!(registry.unregister_all(mine).unwrap(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.listeners_for("message").len(), 1);
        assert!(registry.listeners_for("message_edit").is_empty());

        // nothing left for this owner
        assert_eq!(registry.unregister_all(mine).unwrap(), 0);
    }

    #[test]
    fn register_all_is_atomic() {
        let registry = ListenerRegistry::new();
        let survivor = owner(1);
        let kept = registry.register(survivor, "message", noop(), 50).unwrap();

        let m = owner(2);
        let dup = HandlerDecl::new("message", |_| async { Ok(()) });
        let handlers = vec![
            HandlerDecl::new("message", |_| async { Ok(()) }),
            dup.clone(),
            HandlerDecl::new("load", |_| async { Ok(()) }),
            dup,
        ];

        let err = registry.register_all(m, handlers).unwrap_err();
        match err {
            RegistryError::Batch { index, source } => {
                assert_eq!(index, 3);
                assert!(matches!(*source, RegistryError::Duplicate(_)));
            }
            other => panic!("expected Batch, got {other}"),
        }

        // everything the batch inserted was rolled back
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry
                .listeners_for("message")
                .iter()
                .map(|l| l.id)
                .collect::<Vec<_>>(),
            vec![kept]
        );
        assert!(registry.listeners_for("load").is_empty());

        let ids = registry
            .register_all(
                m,
                vec![
                    HandlerDecl::new("message", |_| async { Ok(()) }),
                    HandlerDecl::new("load", |_| async { Ok(()) }).with_priority(10),
                ],
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(registry.len(), 3);
    }
}
