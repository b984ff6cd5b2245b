//! Test units compiled into the binary, plus the adapter that turns
//! declarative definitions into units.

pub mod declarative;
pub mod snapshot;

use crate::registry::Registry;

/// Register every built-in unit.
pub fn register_builtins(registry: &mut Registry) {
    registry.register(snapshot::NAME, |_| Ok(Box::new(snapshot::SnapshotUnit)));
}
