//! Event-driven bot core: module loading, listener dispatch and namespaced storage

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod modules;
