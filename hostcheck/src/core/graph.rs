//! Dependency graph over test units and its topological order.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

/// Static description of a registered unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub name: String,
    /// Unit names that must run first, in declaration order.
    pub dependencies: Vec<String>,
    /// Method names in execution (lexical) order.
    pub methods: Vec<String>,
}

/// Fatal configuration problems found while resolving the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unit '{0}' is registered more than once")]
    DuplicateUnit(String),
    #[error("unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },
    /// `path` starts and ends with the same unit.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Unit name → dependency names. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

impl DependencyGraph {
    /// Build the graph, rejecting duplicate names and unknown dependencies.
    pub fn build(descriptors: &[UnitDescriptor]) -> Result<Self, ResolveError> {
        let mut edges = BTreeMap::new();
        for descriptor in descriptors {
            if edges
                .insert(descriptor.name.clone(), descriptor.dependencies.clone())
                .is_some()
            {
                return Err(ResolveError::DuplicateUnit(descriptor.name.clone()));
            }
        }
        for (unit, dependencies) in &edges {
            if let Some(dependency) = dependencies.iter().find(|dep| !edges.contains_key(*dep)) {
                return Err(ResolveError::UnknownDependency {
                    unit: unit.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(Self { edges })
    }

    pub fn dependencies(&self, unit: &str) -> &[String] {
        self.edges.get(unit).map(Vec::as_slice).unwrap_or_default()
    }

    /// Depth-first topological order: every dependency precedes its dependents.
    ///
    /// Roots are visited in lexical order and dependencies in declaration
    /// order, so the result is stable for a given graph.
    pub fn order(&self) -> Result<Vec<String>, ResolveError> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.edges.len());
        for unit in self.edges.keys() {
            self.visit(unit, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        unit: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), ResolveError> {
        match marks.get(unit) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|name| *name == unit).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                path.push(unit.to_string());
                return Err(ResolveError::Cycle { path });
            }
            None => {}
        }

        marks.insert(unit, Mark::Visiting);
        stack.push(unit);
        for dependency in self.dependencies(unit) {
            self.visit(dependency, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(unit, Mark::Visited);
        order.push(unit.to_string());
        Ok(())
    }
}

/// Build the graph for `descriptors` and return one valid execution order.
pub fn resolve(descriptors: &[UnitDescriptor]) -> Result<Vec<String>, ResolveError> {
    DependencyGraph::build(descriptors)?.order()
}
