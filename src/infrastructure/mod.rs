//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: Data persistence
//! - Console: Development event source

pub mod config;
pub mod console;
pub mod storage;
