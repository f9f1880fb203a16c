//! Application layer errors

use std::path::PathBuf;

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Module error: {0}")]
    Module(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Listener registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate listener for event '{0}'")]
    Duplicate(String),

    #[error("Listener not found")]
    NotFound,

    #[error("Batch registration failed at handler {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<RegistryError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage at '{path}' is locked by another process")]
    InUse { path: PathBuf },

    #[error("Storage at '{path}' is corrupted and could not be repaired: {detail}")]
    Corrupted { path: PathBuf, detail: String },

    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Operation '{op}' is not supported by in-memory storage")]
    UnsupportedInFallback { op: &'static str },
}

impl StoreError {
    pub(crate) fn engine(err: impl std::fmt::Display) -> Self {
        Self::Engine(err.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}
