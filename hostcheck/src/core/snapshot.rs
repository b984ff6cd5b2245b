//! Read-only view of the host's observed configuration state.

use serde_json::{Value, json};
use thiserror::Error;

/// Lookup of a dot-separated path that hit a missing or null segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing property {path}")]
pub struct MissingProperty {
    /// Full path that was requested.
    pub path: String,
    /// First segment that did not resolve.
    pub segment: String,
}

/// Opaque nested key-value tree queried by test units.
///
/// Never mutated after loading; units only receive `&Snapshot`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    root: Value,
}

impl Snapshot {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Placeholder used when no state document could be loaded.
    pub fn dummy() -> Self {
        Self::new(json!({ "services": [], "dummy": true }))
    }

    pub fn is_dummy(&self) -> bool {
        self.root.get("dummy") == Some(&Value::Bool(true))
    }

    /// Resolve `a.b.c`. Numeric segments index into arrays.
    pub fn lookup(&self, path: &str) -> Result<&Value, MissingProperty> {
        let mut current = &self.root;
        for segment in path.split('.') {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                _ => None,
            };
            match next {
                Some(value) if !value.is_null() => current = value,
                _ => {
                    return Err(MissingProperty {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    });
                }
            }
        }
        Ok(current)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::dummy()
    }
}
