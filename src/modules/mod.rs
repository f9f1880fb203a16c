//! Builtin modules

pub mod activity;
pub mod stats;

pub use activity::ActivityModule;
pub use stats::StatsModule;
