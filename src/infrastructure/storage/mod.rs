//! Embedded key-value storage multiplexed into per-module namespaces

pub mod engine;
pub mod iter;
pub mod provider;
pub mod store;

pub use engine::StorageEngine;
pub use iter::StoreIter;
pub use provider::StorageProvider;
pub use store::{Store, StoreSnapshot};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::application::errors::StoreError;

/// msgpack encoding, compact and self-describing
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(rmp_serde::from_slice(bytes)?)
}
