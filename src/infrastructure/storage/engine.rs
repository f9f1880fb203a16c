//! Embedded storage engine with an in-memory fallback

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, DatabaseError, ReadOnlyTable, ReadableTable, StorageError, TableDefinition};
use tokio::sync::RwLock;

use crate::application::errors::StoreError;

/// Single ordered table holding every namespace, keyed by full UTF-8 key
const KV_TABLE: TableDefinition<&[u8], Vec<u8>> = TableDefinition::new("kv");

/// Storage engine - a durable ordered key-value store, or an in-memory
/// substitute when no durable engine is available
pub struct StorageEngine {
    backend: Backend,
    path: Option<PathBuf>,
}

enum Backend {
    Durable(Arc<Database>),
    Memory(Arc<RwLock<BTreeMap<String, Vec<u8>>>>),
}

impl StorageEngine {
    /// Open the engine at `path`, or in memory when `path` is `None`.
    ///
    /// A lock held by another process and unrepairable corruption are fatal;
    /// any other open failure degrades to the in-memory fallback.
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let Some(path) = path else {
            return Ok(Self::in_memory());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(
                        "Could not create storage directory '{}' ({}), falling back to in-memory storage",
                        parent.display(),
                        e
                    );
                    return Ok(Self::in_memory());
                }
            }
        }

        match Database::create(path) {
            Ok(db) => match ensure_kv_table(&db) {
                Ok(()) => Ok(Self::durable(db, path)),
                Err(e) => {
                    tracing::warn!(
                        "Storage at '{}' is not usable ({}), falling back to in-memory storage",
                        path.display(),
                        e
                    );
                    Ok(Self::in_memory())
                }
            },
            Err(e) if is_lock_contention(&e) => Err(StoreError::InUse {
                path: path.to_path_buf(),
            }),
            Err(e) if is_corruption(&e) => {
                tracing::warn!(
                    "Storage at '{}' is corrupted, attempting repair",
                    path.display()
                );
                Self::repair_and_reopen(path, e.to_string())
            }
            Err(e) => {
                tracing::warn!(
                    "Could not open storage at '{}' ({}), falling back to in-memory storage",
                    path.display(),
                    e
                );
                Ok(Self::in_memory())
            }
        }
    }

    /// Open the in-memory fallback directly
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(BTreeMap::new()))),
            path: None,
        }
    }

    fn durable(db: Database, path: &Path) -> Self {
        Self {
            backend: Backend::Durable(Arc::new(db)),
            path: Some(path.to_path_buf()),
        }
    }

    /// One repair pass, one retry. The original corruption detail is
    /// surfaced if the retry fails too.
    fn repair_and_reopen(path: &Path, detail: String) -> Result<Self, StoreError> {
        let corrupted = |detail: String| StoreError::Corrupted {
            path: path.to_path_buf(),
            detail,
        };
        match Database::create(path) {
            Ok(mut db) => match db.check_integrity() {
                Ok(_) => {
                    ensure_kv_table(&db).map_err(|_| corrupted(detail.clone()))?;
                    tracing::info!("Storage at '{}' repaired", path.display());
                    Ok(Self::durable(db, path))
                }
                Err(_) => Err(corrupted(detail)),
            },
            Err(_) => Err(corrupted(detail)),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.backend, Backend::Memory(_))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) async fn put(&self, key: String, value: Vec<u8>) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Durable(db) => {
                run_engine(db, move |db| {
                    let txn = db.begin_write().map_err(StoreError::engine)?;
                    {
                        let mut table = txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
                        table
                            .insert(key.as_bytes(), value)
                            .map_err(StoreError::engine)?;
                    }
                    txn.commit().map_err(StoreError::engine)
                })
                .await
            }
            Backend::Memory(map) => {
                map.write().await.insert(key, value);
                Ok(())
            }
        }
    }

    pub(crate) async fn get(&self, key: String) -> Result<Option<Vec<u8>>, StoreError> {
        match &self.backend {
            Backend::Durable(db) => {
                run_engine(db, move |db| {
                    let txn = db.begin_read().map_err(StoreError::engine)?;
                    let table = txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
                    let value = table.get(key.as_bytes()).map_err(StoreError::engine)?;
                    Ok(value.map(|guard| guard.value()))
                })
                .await
            }
            Backend::Memory(map) => Ok(map.read().await.get(&key).cloned()),
        }
    }

    /// Idempotent: deleting an absent key is not an error
    pub(crate) async fn delete(&self, key: String) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Durable(db) => {
                run_engine(db, move |db| {
                    let txn = db.begin_write().map_err(StoreError::engine)?;
                    {
                        let mut table = txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
                        table.remove(key.as_bytes()).map_err(StoreError::engine)?;
                    }
                    txn.commit().map_err(StoreError::engine)
                })
                .await
            }
            Backend::Memory(map) => {
                map.write().await.remove(&key);
                Ok(())
            }
        }
    }

    pub(crate) async fn has(&self, key: String) -> Result<bool, StoreError> {
        match &self.backend {
            Backend::Durable(db) => {
                run_engine(db, move |db| {
                    let txn = db.begin_read().map_err(StoreError::engine)?;
                    let table = txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
                    let value = table.get(key.as_bytes()).map_err(StoreError::engine)?;
                    Ok(value.is_some())
                })
                .await
            }
            Backend::Memory(map) => Ok(map.read().await.contains_key(&key)),
        }
    }

    /// Remove every key under `prefix` in one write transaction
    pub(crate) async fn clear_prefix(&self, prefix: String) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Durable(db) => {
                run_engine(db, move |db| {
                    let txn = db.begin_write().map_err(StoreError::engine)?;
                    {
                        let mut table = txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
                        let end = prefix_end(prefix.as_bytes());
                        let keys = {
                            let lower = Bound::Included(prefix.as_bytes());
                            let upper = match end.as_deref() {
                                Some(e) => Bound::Excluded(e),
                                None => Bound::Unbounded,
                            };
                            let range = table
                                .range::<&[u8]>((lower, upper))
                                .map_err(StoreError::engine)?;
                            let mut keys = Vec::new();
                            for entry in range {
                                let (key, _) = entry.map_err(StoreError::engine)?;
                                keys.push(key.value().to_vec());
                            }
                            keys
                        };
                        for key in keys {
                            table
                                .remove(key.as_slice())
                                .map_err(StoreError::engine)?;
                        }
                    }
                    txn.commit().map_err(StoreError::engine)
                })
                .await
            }
            Backend::Memory(map) => {
                map.write().await.retain(|key, _| !key.starts_with(&prefix));
                Ok(())
            }
        }
    }

    /// Point-in-time read view, invisible to later writes
    pub(crate) async fn snapshot(&self) -> Result<EngineSnapshot, StoreError> {
        match &self.backend {
            Backend::Durable(db) => {
                run_engine(db, move |db| {
                    let txn = db.begin_read().map_err(StoreError::engine)?;
                    let table = txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
                    Ok(EngineSnapshot {
                        inner: SnapshotInner::Durable(Arc::new(table)),
                    })
                })
                .await
            }
            Backend::Memory(map) => Ok(EngineSnapshot {
                inner: SnapshotInner::Memory(map.read().await.clone()),
            }),
        }
    }
}

/// Frozen view of the engine; dropped to release the read transaction
pub struct EngineSnapshot {
    pub(crate) inner: SnapshotInner,
}

pub(crate) enum SnapshotInner {
    Durable(Arc<ReadOnlyTable<&'static [u8], Vec<u8>>>),
    Memory(BTreeMap<String, Vec<u8>>),
}

impl EngineSnapshot {
    pub(crate) async fn get(&self, key: String) -> Result<Option<Vec<u8>>, StoreError> {
        match &self.inner {
            SnapshotInner::Durable(table) => {
                let table = table.clone();
                tokio::task::spawn_blocking(move || {
                    let value = table.get(key.as_bytes()).map_err(StoreError::engine)?;
                    Ok(value.map(|guard| guard.value()))
                })
                .await
                .map_err(|e| StoreError::Engine(e.to_string()))?
            }
            SnapshotInner::Memory(map) => Ok(map.get(&key).cloned()),
        }
    }

    pub(crate) async fn has(&self, key: String) -> Result<bool, StoreError> {
        match &self.inner {
            SnapshotInner::Durable(table) => {
                let table = table.clone();
                tokio::task::spawn_blocking(move || {
                    let value = table.get(key.as_bytes()).map_err(StoreError::engine)?;
                    Ok(value.is_some())
                })
                .await
                .map_err(|e| StoreError::Engine(e.to_string()))?
            }
            SnapshotInner::Memory(map) => Ok(map.contains_key(&key)),
        }
    }
}

/// Run a closure against the database on the blocking pool
async fn run_engine<T, F>(db: &Arc<Database>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| StoreError::Engine(e.to_string()))?
}

/// Create the table up front so read transactions never see it missing
fn ensure_kv_table(db: &Database) -> Result<(), StoreError> {
    let txn = db.begin_write().map_err(StoreError::engine)?;
    txn.open_table(KV_TABLE).map_err(StoreError::engine)?;
    txn.commit().map_err(StoreError::engine)
}

fn is_lock_contention(err: &DatabaseError) -> bool {
    match err {
        DatabaseError::DatabaseAlreadyOpen => true,
        DatabaseError::Storage(StorageError::Io(io)) => {
            io.kind() == std::io::ErrorKind::WouldBlock
        }
        _ => false,
    }
}

// A garbage or truncated header surfaces as an InvalidData I/O error,
// not as StorageError::Corrupted
fn is_corruption(err: &DatabaseError) -> bool {
    match err {
        DatabaseError::Storage(StorageError::Corrupted(_)) => true,
        DatabaseError::Storage(StorageError::Io(io)) => {
            io.kind() == std::io::ErrorKind::InvalidData
        }
        _ => false,
    }
}

/// Smallest byte string greater than every string with this prefix,
/// or `None` when no such bound exists
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last == u8::MAX {
            end.pop();
        } else {
            *end.last_mut().unwrap() = last + 1;
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_end_increments_last_byte() {
        assert_eq!(prefix_end(b"mod."), Some(b"mod/".to_vec()));
        assert_eq!(prefix_end(b"a"), Some(b"b".to_vec()));
    }

    #[test]
    fn prefix_end_skips_trailing_max_bytes() {
        assert_eq!(prefix_end(&[b'a', 0xFF, 0xFF]), Some(vec![b'b']));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_end(b""), None);
    }

    #[tokio::test]
    async fn fallback_round_trip() {
        let engine = StorageEngine::in_memory();
        assert!(engine.is_fallback());

        engine.put("k".into(), vec![1, 2, 3]).await.unwrap();
        assert_eq!(engine.get("k".into()).await.unwrap(), Some(vec![1, 2, 3]));
        assert!(engine.has("k".into()).await.unwrap());

        engine.delete("k".into()).await.unwrap();
        assert_eq!(engine.get("k".into()).await.unwrap(), None);
        // deleting again is fine
        engine.delete("k".into()).await.unwrap();
    }

    #[tokio::test]
    async fn durable_round_trip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");

        let engine = StorageEngine::open(Some(&path)).unwrap();
        assert!(!engine.is_fallback());
        engine.put("k".into(), vec![9]).await.unwrap();
        drop(engine);

        let engine = StorageEngine::open(Some(&path)).unwrap();
        assert_eq!(engine.get("k".into()).await.unwrap(), Some(vec![9]));
    }

    #[tokio::test]
    async fn durable_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/bot.db");

        let engine = StorageEngine::open(Some(&path)).unwrap();
        assert!(!engine.is_fallback());
        assert!(path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn second_open_reports_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");

        let _held = StorageEngine::open(Some(&path)).unwrap();
        match StorageEngine::open(Some(&path)) {
            Err(StoreError::InUse { path: p }) => assert_eq!(p, path),
            other => panic!("expected InUse, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn garbage_file_reports_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();

        // must be fatal, never a silent fall back to the in-memory engine
        match StorageEngine::open(Some(&path)) {
            Err(StoreError::Corrupted { path: p, .. }) => assert_eq!(p, path),
            other => panic!(
                "expected Corrupted, got {:?}",
                other.map(|engine| engine.is_fallback())
            ),
        }
    }

    #[tokio::test]
    async fn clear_prefix_only_touches_the_prefix() {
        let engine = StorageEngine::in_memory();
        engine.put("a.x".into(), vec![1]).await.unwrap();
        engine.put("a.y".into(), vec![2]).await.unwrap();
        engine.put("b.x".into(), vec![3]).await.unwrap();

        engine.clear_prefix("a.".into()).await.unwrap();
        assert!(!engine.has("a.x".into()).await.unwrap());
        assert!(!engine.has("a.y".into()).await.unwrap());
        assert!(engine.has("b.x".into()).await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_ignores_later_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        let engine = StorageEngine::open(Some(&path)).unwrap();

        engine.put("k".into(), vec![1]).await.unwrap();
        let snap = engine.snapshot().await.unwrap();
        engine.put("k".into(), vec![2]).await.unwrap();

        assert_eq!(snap.get("k".into()).await.unwrap(), Some(vec![1]));
        assert_eq!(engine.get("k".into()).await.unwrap(), Some(vec![2]));
    }
}
