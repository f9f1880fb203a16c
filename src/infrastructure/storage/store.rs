//! Namespaced async view over the storage engine

use std::collections::VecDeque;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::engine::{prefix_end, EngineSnapshot, SnapshotInner, StorageEngine};
use super::iter::StoreIter;
use super::{decode, encode};
use crate::application::errors::StoreError;

/// A value handle onto one key namespace of the shared engine.
///
/// Stores are cheap to clone and hold no data; `prefixed` composes
/// prefixes textually, so nested views address the same flat key space.
#[derive(Clone)]
pub struct Store {
    engine: Arc<StorageEngine>,
    prefix: String,
}

impl Store {
    pub(crate) fn root(engine: Arc<StorageEngine>) -> Self {
        Self {
            engine,
            prefix: String::new(),
        }
    }

    /// Derive a view whose keys all carry this additional prefix
    pub fn prefixed(&self, prefix: &str) -> Store {
        Store {
            engine: self.engine.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_fallback(&self) -> bool {
        self.engine.is_fallback()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.engine.put(self.full_key(key), encode(value)?).await
    }

    /// `None` when the key is absent; stored values always decode to `Some`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.engine.get(self.full_key(key)).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stored value, or `default` only when the key is absent
    pub async fn get_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, StoreError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Idempotent delete
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.engine.delete(self.full_key(key)).await
    }

    pub async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.engine.has(self.full_key(key)).await
    }

    /// Remove every key in this namespace
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.engine.clear_prefix(self.prefix.clone()).await
    }

    /// Add `delta` to an integer counter, treating an absent key as 0.
    /// Returns the new value.
    pub async fn inc_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let next = self.get_or::<i64>(key, 0).await? + delta;
        self.put(key, &next).await?;
        Ok(next)
    }

    pub async fn inc(&self, key: &str) -> Result<i64, StoreError> {
        self.inc_by(key, 1).await
    }

    pub async fn dec_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.inc_by(key, -delta).await
    }

    pub async fn dec(&self, key: &str) -> Result<i64, StoreError> {
        self.inc_by(key, -1).await
    }

    /// Point-in-time view of this namespace
    pub async fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(StoreSnapshot {
            snap: self.engine.snapshot().await?,
            prefix: self.prefix.clone(),
        })
    }

    /// Iterate the whole namespace in ascending key order
    pub async fn iter(&self) -> Result<StoreIter, StoreError> {
        let snap = self.engine.snapshot().await?;
        Ok(range_iter(snap.inner, &self.prefix, None, None))
    }

    /// Iterate the relative key range `[from, to)`
    pub async fn iter_range(&self, from: &str, to: &str) -> Result<StoreIter, StoreError> {
        let snap = self.engine.snapshot().await?;
        Ok(range_iter(snap.inner, &self.prefix, Some(from), Some(to)))
    }
}

/// Frozen view of one namespace; later writes are invisible to it
pub struct StoreSnapshot {
    snap: EngineSnapshot,
    prefix: String,
}

impl StoreSnapshot {
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.snap.get(self.full_key(key)).await? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, StoreError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    pub async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.snap.has(self.full_key(key)).await
    }

    /// Iterate the snapshot's view of the namespace
    pub fn iter(&self) -> StoreIter {
        let inner = match &self.snap.inner {
            SnapshotInner::Durable(table) => SnapshotInner::Durable(table.clone()),
            SnapshotInner::Memory(map) => SnapshotInner::Memory(map.clone()),
        };
        range_iter(inner, &self.prefix, None, None)
    }

    /// Release the underlying read view; dropping does the same
    pub fn close(self) {}
}

fn range_iter(
    inner: SnapshotInner,
    prefix: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> StoreIter {
    let start = match from {
        Some(from) => format!("{prefix}{from}").into_bytes(),
        None => prefix.as_bytes().to_vec(),
    };
    let stop = match to {
        Some(to) => Some(format!("{prefix}{to}").into_bytes()),
        None => prefix_end(prefix.as_bytes()),
    };
    match inner {
        SnapshotInner::Durable(table) => StoreIter::durable(prefix.to_string(), table, start, stop),
        SnapshotInner::Memory(map) => {
            let items: VecDeque<(String, Vec<u8>)> = map
                .iter()
                .filter(|(key, _)| {
                    key.as_bytes() >= start.as_slice()
                        && stop
                            .as_deref()
                            .map_or(true, |stop| key.as_bytes() < stop)
                })
                .map(|(key, value)| {
                    let relative = key.get(prefix.len()..).unwrap_or_default();
                    (relative.to_string(), value.clone())
                })
                .collect();
            StoreIter::memory(prefix.to_string(), items)
        }
    }
}
