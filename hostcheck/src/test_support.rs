//! Test-only helpers for building units, fetchers and host fixtures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::outcome::{MethodResult, Signal};
use crate::io::fetch::{FetchResult, Fetcher};
use crate::registry::Registry;
use crate::unit::{TestMethod, TestUnit, UnitContext};

/// One request seen by a [`ScriptedFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// Fetcher that answers from a fixed table and records every request.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, FetchResult>,
    requests: RefCell<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn respond(mut self, url: &str, result: FetchResult) -> Self {
        self.responses.insert(url.to_string(), result);
        self
    }

    /// Requests made so far, in order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn get(&self, url: &str, params: &[(&str, &str)]) -> FetchResult {
        self.requests.borrow_mut().push(FetchRequest {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        });
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchResult::Transport(format!("no scripted response for {url}")))
    }
}

/// Behaviour of one scripted test method.
#[derive(Debug, Clone)]
pub enum Script {
    Pass,
    Fail(&'static str),
    Error(&'static str),
    /// Returns without signalling pass.
    Incomplete,
    Panic(&'static str),
    /// Passes when the snapshot property exists.
    Property(&'static str),
}

/// Unit whose methods follow fixed scripts.
#[derive(Debug, Clone)]
pub struct ScriptedUnit {
    name: String,
    dependencies: Vec<String>,
    methods: Vec<(String, Script)>,
}

impl ScriptedUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }

    pub fn method(mut self, name: &str, script: Script) -> Self {
        self.methods.push((name.to_string(), script));
        self
    }
}

impl TestUnit for ScriptedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn methods(&self) -> Vec<TestMethod<'_>> {
        self.methods
            .iter()
            .map(|(name, script)| TestMethod::new(name.clone(), move |ctx| run_script(ctx, script)))
            .collect()
    }
}

fn run_script(ctx: &UnitContext<'_>, script: &Script) -> MethodResult {
    match script {
        Script::Pass => Ok(ctx.pass()),
        Script::Fail(message) => ctx.fail(*message),
        Script::Error(message) => Err(Signal::error(*message)),
        Script::Incomplete => Err(Signal::Incomplete),
        Script::Panic(message) => panic!("{message}"),
        Script::Property(path) => {
            ctx.assert_property(path)?;
            Ok(ctx.pass())
        }
    }
}

/// Registry holding exactly the given units.
pub fn registry_of(units: Vec<ScriptedUnit>) -> Registry {
    let mut registry = Registry::new();
    for unit in units {
        let name = unit.name.clone();
        registry.register(name, move |_| Ok(Box::new(unit.clone())));
    }
    registry
}

/// Temporary host layout: a snapshot file, a units directory and a config.
pub struct TestHost {
    dir: TempDir,
}

impl TestHost {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        fs::create_dir_all(dir.path().join("units")).context("create units dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.path().join("snapshot.json")
    }

    pub fn units_dir(&self) -> PathBuf {
        self.path().join("units")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("hostcheck.toml")
    }

    pub fn write_snapshot(&self, snapshot: &Value) -> Result<()> {
        let contents = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
        fs::write(self.snapshot_path(), contents).context("write snapshot")
    }

    pub fn write_unit(&self, file_name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.units_dir().join(file_name);
        fs::write(&path, contents).with_context(|| format!("write unit {file_name}"))?;
        Ok(path)
    }

    /// Config pointing at this host's snapshot and units.
    pub fn write_config(&self, extra: &str) -> Result<PathBuf> {
        let contents = format!(
            "snapshot_path = '{}'\nunits_dir = '{}'\n{extra}",
            self.snapshot_path().display(),
            self.units_dir().display()
        );
        let path = self.config_path();
        fs::write(&path, contents).context("write config")?;
        Ok(path)
    }
}
