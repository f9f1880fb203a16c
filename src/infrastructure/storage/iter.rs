//! Lazy iteration over a namespaced key range

use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;

use redb::ReadOnlyTable;
use serde::de::DeserializeOwned;

use super::decode;
use crate::application::errors::StoreError;

/// Cursor over a key range, yielding `(relative key, decoded value)` pairs
/// in ascending key order.
///
/// Durable iterators hold their own read transaction, so they observe a
/// consistent view and are released on drop, whatever way the consuming
/// loop exits. The in-memory fallback materializes the range up front and
/// supports forward iteration only.
pub struct StoreIter {
    prefix: String,
    backend: IterBackend,
}

pub(crate) enum IterBackend {
    Durable {
        table: Arc<ReadOnlyTable<&'static [u8], Vec<u8>>>,
        start: Vec<u8>,
        stop: Option<Vec<u8>>,
        pos: Cursor,
    },
    Memory {
        items: VecDeque<(String, Vec<u8>)>,
    },
}

/// Position between entries; keys are absolute
pub(crate) enum Cursor {
    Start,
    Before(Vec<u8>),
    After(Vec<u8>),
    End,
}

impl StoreIter {
    pub(crate) fn durable(
        prefix: String,
        table: Arc<ReadOnlyTable<&'static [u8], Vec<u8>>>,
        start: Vec<u8>,
        stop: Option<Vec<u8>>,
    ) -> Self {
        Self {
            prefix,
            backend: IterBackend::Durable {
                table,
                start,
                stop,
                pos: Cursor::Start,
            },
        }
    }

    pub(crate) fn memory(prefix: String, items: VecDeque<(String, Vec<u8>)>) -> Self {
        Self {
            prefix,
            backend: IterBackend::Memory { items },
        }
    }

    /// Next entry in ascending order, or `None` past the end of the range
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<(String, T)>, StoreError> {
        match &mut self.backend {
            IterBackend::Durable {
                table,
                start,
                stop,
                pos,
            } => {
                let lower = match pos {
                    Cursor::Start => Bound::Included(start.clone()),
                    Cursor::Before(key) => Bound::Included(key.clone()),
                    Cursor::After(key) => Bound::Excluded(key.clone()),
                    Cursor::End => return Ok(None),
                };
                match read_first(table.clone(), lower, stop.clone()).await? {
                    Some((key, value)) => {
                        *pos = Cursor::After(key.clone());
                        Ok(Some((strip_prefix(&self.prefix, &key), decode(&value)?)))
                    }
                    None => {
                        *pos = Cursor::End;
                        Ok(None)
                    }
                }
            }
            IterBackend::Memory { items } => match items.pop_front() {
                Some((key, value)) => Ok(Some((key, decode(&value)?))),
                None => Ok(None),
            },
        }
    }

    /// Step back over the entry to the left of the cursor and return it.
    ///
    /// The cursor sits between entries, so `prev` directly after `next`
    /// returns the entry `next` just yielded.
    ///
    /// Not supported by the in-memory fallback.
    pub async fn prev<T: DeserializeOwned>(&mut self) -> Result<Option<(String, T)>, StoreError> {
        match &mut self.backend {
            IterBackend::Durable {
                table,
                start,
                stop,
                pos,
            } => {
                let upper = match pos {
                    Cursor::Start => return Ok(None),
                    Cursor::Before(key) => Bound::Excluded(key.clone()),
                    Cursor::After(key) => Bound::Included(key.clone()),
                    Cursor::End => match stop {
                        Some(stop) => Bound::Excluded(stop.clone()),
                        None => Bound::Unbounded,
                    },
                };
                match read_last(table.clone(), start.clone(), upper).await? {
                    Some((key, value)) => {
                        *pos = Cursor::Before(key.clone());
                        Ok(Some((strip_prefix(&self.prefix, &key), decode(&value)?)))
                    }
                    None => {
                        *pos = Cursor::Start;
                        Ok(None)
                    }
                }
            }
            IterBackend::Memory { .. } => Err(StoreError::UnsupportedInFallback { op: "prev" }),
        }
    }

    /// Position the cursor so the next entry is the first key >= `key`
    /// (relative to the namespace), clamped to the iterator's range.
    pub fn seek(&mut self, key: &str) -> Result<(), StoreError> {
        let full = format!("{}{}", self.prefix, key).into_bytes();
        match &mut self.backend {
            IterBackend::Durable {
                start, stop, pos, ..
            } => {
                *pos = if full.as_slice() < start.as_slice() {
                    Cursor::Start
                } else if stop
                    .as_ref()
                    .map_or(false, |stop| full.as_slice() >= stop.as_slice())
                {
                    Cursor::End
                } else {
                    Cursor::Before(full)
                };
                Ok(())
            }
            IterBackend::Memory { .. } => Err(StoreError::UnsupportedInFallback { op: "seek" }),
        }
    }

    /// Rewind to the beginning of the range
    pub fn seek_to_start(&mut self) -> Result<(), StoreError> {
        match &mut self.backend {
            IterBackend::Durable { pos, .. } => {
                *pos = Cursor::Start;
                Ok(())
            }
            IterBackend::Memory { .. } => Err(StoreError::UnsupportedInFallback {
                op: "seek_to_start",
            }),
        }
    }

    /// Move past the end of the range, so only `prev` yields entries
    pub fn seek_to_stop(&mut self) -> Result<(), StoreError> {
        match &mut self.backend {
            IterBackend::Durable { pos, .. } => {
                *pos = Cursor::End;
                Ok(())
            }
            IterBackend::Memory { .. } => Err(StoreError::UnsupportedInFallback {
                op: "seek_to_stop",
            }),
        }
    }

    /// Drain the remaining entries into a vector
    pub async fn collect_remaining<T: DeserializeOwned>(
        &mut self,
    ) -> Result<Vec<(String, T)>, StoreError> {
        let mut out = Vec::new();
        while let Some(entry) = self.next::<T>().await? {
            out.push(entry);
        }
        Ok(out)
    }
}

fn strip_prefix(prefix: &str, key: &[u8]) -> String {
    let relative = key.get(prefix.len()..).unwrap_or_default();
    String::from_utf8_lossy(relative).into_owned()
}

async fn read_first(
    table: Arc<ReadOnlyTable<&'static [u8], Vec<u8>>>,
    lower: Bound<Vec<u8>>,
    stop: Option<Vec<u8>>,
) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
    tokio::task::spawn_blocking(move || {
        let lower = as_slice_bound(&lower);
        let upper = match stop.as_deref() {
            Some(stop) => Bound::Excluded(stop),
            None => Bound::Unbounded,
        };
        let mut range = table
            .range::<&[u8]>((lower, upper))
            .map_err(StoreError::engine)?;
        match range.next() {
            Some(entry) => {
                let (key, value) = entry.map_err(StoreError::engine)?;
                Ok(Some((key.value().to_vec(), value.value())))
            }
            None => Ok(None),
        }
    })
    .await
    .map_err(|e| StoreError::Engine(e.to_string()))?
}

async fn read_last(
    table: Arc<ReadOnlyTable<&'static [u8], Vec<u8>>>,
    start: Vec<u8>,
    upper: Bound<Vec<u8>>,
) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
    tokio::task::spawn_blocking(move || {
        let lower = Bound::Included(start.as_slice());
        let upper = as_slice_bound(&upper);
        let mut range = table
            .range::<&[u8]>((lower, upper))
            .map_err(StoreError::engine)?;
        match range.next_back() {
            Some(entry) => {
                let (key, value) = entry.map_err(StoreError::engine)?;
                Ok(Some((key.value().to_vec(), value.value())))
            }
            None => Ok(None),
        }
    })
    .await
    .map_err(|e| StoreError::Engine(e.to_string()))?
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_iter(entries: &[(&str, i64)]) -> StoreIter {
        let items = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), rmp_serde::to_vec_named(v).unwrap()))
            .collect();
        StoreIter::memory("m.".to_string(), items)
    }

    #[tokio::test]
    async fn memory_iterates_in_order() {
        let mut iter = memory_iter(&[("a", 1), ("b", 2)]);
        assert_eq!(iter.next::<i64>().await.unwrap(), Some(("a".into(), 1)));
        assert_eq!(iter.next::<i64>().await.unwrap(), Some(("b".into(), 2)));
        assert_eq!(iter.next::<i64>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_rejects_cursor_ops() {
        let mut iter = memory_iter(&[("a", 1)]);
        assert!(matches!(
            iter.seek("a"),
            Err(StoreError::UnsupportedInFallback { op: "seek" })
        ));
        assert!(matches!(
            iter.seek_to_start(),
            Err(StoreError::UnsupportedInFallback { .. })
        ));
        assert!(matches!(
            iter.seek_to_stop(),
            Err(StoreError::UnsupportedInFallback { .. })
        ));
        assert!(matches!(
            iter.prev::<i64>().await,
            Err(StoreError::UnsupportedInFallback { op: "prev" })
        ));
    }

    #[test]
    fn strip_prefix_is_byte_based() {
        assert_eq!(strip_prefix("mod.", b"mod.counter"), "counter");
        assert_eq!(strip_prefix("", b"counter"), "counter");
    }
}
