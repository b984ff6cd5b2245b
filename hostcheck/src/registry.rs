//! Explicit registry of unit factories, and the discovery pass that turns it
//! into instantiated units.
//!
//! Factories receive the snapshot so a unit can decline to run on hosts where
//! it does not apply. Skipping cascades: a unit that depends on a skipped unit
//! is skipped too.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::core::graph::ResolveError;
use crate::core::outcome::{OutcomeRecord, Skip};
use crate::core::snapshot::Snapshot;
use crate::io::unit_defs::{UnitDefinition, discover_units};
use crate::suites;
use crate::suites::declarative::DeclarativeUnit;
use crate::unit::TestUnit;

type Factory = Box<dyn Fn(&Snapshot) -> Result<Box<dyn TestUnit>, Skip>>;

struct Entry {
    name: String,
    factory: Factory,
}

/// Units available to a run, keyed by name.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

/// Result of instantiating every registered unit against a snapshot.
pub struct Discovery {
    pub units: Vec<Box<dyn TestUnit>>,
    /// One skip record per excluded unit, in discovery order.
    pub skipped: Vec<OutcomeRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in units.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        suites::register_builtins(&mut registry);
        registry
    }

    /// Built-ins plus every definition found in `units_dir`.
    pub fn load(units_dir: &Path) -> Result<Self> {
        let mut registry = Self::with_builtins();
        for definition in discover_units(units_dir)? {
            registry.register_definition(definition);
        }
        debug!(units = registry.len(), "registry loaded");
        Ok(registry)
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Snapshot) -> Result<Box<dyn TestUnit>, Skip> + 'static,
    ) {
        self.entries.push(Entry {
            name: name.into(),
            factory: Box::new(factory),
        });
    }

    pub fn register_definition(&mut self, definition: UnitDefinition) {
        let name = definition.name.clone();
        self.register(name, move |snapshot| {
            let unit = DeclarativeUnit::instantiate(definition.clone(), snapshot)?;
            Ok(Box::new(unit))
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(|entry| entry.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate every unit against `snapshot`.
    ///
    /// Names must be unique across built-in and declarative units, checked
    /// before any factory runs.
    pub fn discover(&self, snapshot: &Snapshot) -> Result<Discovery> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by(|left, right| left.name.cmp(&right.name));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(ResolveError::DuplicateUnit(pair[0].name.clone()).into());
        }

        let mut units: Vec<Box<dyn TestUnit>> = Vec::new();
        let mut skipped: Vec<(String, Skip)> = Vec::new();
        for entry in entries {
            match (entry.factory)(snapshot) {
                Ok(unit) => {
                    if unit.name() != entry.name {
                        bail!(
                            "unit registered as {} reports name {}",
                            entry.name,
                            unit.name()
                        );
                    }
                    units.push(unit);
                }
                Err(skip) => {
                    info!(unit = %entry.name, reason = %skip, "unit skipped");
                    skipped.push((entry.name.clone(), skip));
                }
            }
        }

        loop {
            let skipped_names: HashSet<&str> =
                skipped.iter().map(|(name, _)| name.as_str()).collect();
            let next = units.iter().enumerate().find_map(|(index, unit)| {
                unit.dependencies()
                    .into_iter()
                    .find(|dependency| skipped_names.contains(dependency.as_str()))
                    .map(|dependency| (index, dependency))
            });
            let Some((index, dependency)) = next else {
                break;
            };
            let unit = units.remove(index);
            info!(unit = unit.name(), dependency = %dependency, "unit skipped with dependency");
            skipped.push((
                unit.name().to_string(),
                Skip::new(format!("depends on skipped unit {dependency}")),
            ));
        }

        Ok(Discovery {
            units,
            skipped: skipped
                .iter()
                .map(|(name, skip)| OutcomeRecord::skipped(name, skip))
                .collect(),
        })
    }
}
