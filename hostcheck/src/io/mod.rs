//! I/O helpers for check runs.

pub mod config;
pub mod fetch;
pub mod snapshot_store;
pub mod unit_defs;
