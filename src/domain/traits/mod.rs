//! Domain traits - Abstractions for module implementations

pub mod module;

pub use module::Module;
