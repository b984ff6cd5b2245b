//! Declarative unit definition parsing and discovery.
//!
//! Each `*.toml` file in the units directory defines one test unit:
//!
//! ```toml
//! name = "web_server"
//! depends = ["snapshot"]
//! skip_unless = "services.nginx"
//!
//! [[test]]
//! name = "test_listens_on_configured_port"
//! steps = [
//!   { type = "property", path = "services.nginx.port", equals = 443 },
//!   { type = "file_match", path = "/etc/nginx/nginx.conf", pattern = 'listen\s+(\d+)', expect = "443" },
//!   { type = "fetch", url = "https://localhost/health", contains = "ok" },
//! ]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use toml::Spanned;

use crate::core::outcome::SourceLocation;

/// One assertion inside a declarative test.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Snapshot property must exist, and equal `equals` when given.
    Property {
        path: String,
        #[serde(default)]
        equals: Option<Value>,
    },
    /// File must match `pattern`; the first capture must equal `expect` when given.
    FileMatch {
        path: PathBuf,
        pattern: String,
        #[serde(default)]
        expect: Option<String>,
    },
    /// GET must return 2xx; the body must contain `contains` when given.
    Fetch {
        url: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
        #[serde(default)]
        contains: Option<String>,
    },
    /// Unconditional failure.
    Fail { message: String },
}

/// A step plus the place it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    pub step: Step,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

/// A parsed and validated unit definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDefinition {
    /// Unique identifier (`[a-z0-9_-]+`).
    pub name: String,
    /// Units that must run first.
    pub depends: Vec<String>,
    /// Snapshot property that must exist, otherwise the unit is skipped.
    pub skip_unless: Option<String>,
    pub tests: Vec<TestDefinition>,
    /// File the definition was read from.
    pub source: PathBuf,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUnit {
    name: String,
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default)]
    skip_unless: Option<String>,
    #[serde(default, rename = "test")]
    tests: Vec<RawTest>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTest {
    name: String,
    #[serde(default)]
    steps: Vec<Spanned<Step>>,
}

impl UnitDefinition {
    /// Load and validate a unit definition from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read unit {}", path.display()))?;
        Self::parse_str(&contents, path).with_context(|| format!("load unit {}", path.display()))
    }

    /// Parse a definition; `source` is only used for locations.
    pub fn parse_str(contents: &str, source: &Path) -> Result<Self> {
        let raw: RawUnit = toml::from_str(contents).context("parse unit")?;
        let file = source.display().to_string();
        let tests = raw
            .tests
            .into_iter()
            .map(|test| TestDefinition {
                name: test.name,
                steps: test
                    .steps
                    .into_iter()
                    .map(|spanned| {
                        let line = line_at(contents, spanned.span().start);
                        StepDefinition {
                            step: spanned.into_inner(),
                            location: SourceLocation::new(file.clone(), line),
                        }
                    })
                    .collect(),
            })
            .collect();
        let unit = UnitDefinition {
            name: raw.name,
            depends: raw.depends,
            skip_unless: raw.skip_unless,
            tests,
            source: source.to_path_buf(),
        };
        unit.validate()?;
        Ok(unit)
    }

    fn validate(&self) -> Result<()> {
        validate_unit_name(&self.name)?;
        for dependency in &self.depends {
            if dependency.trim().is_empty() {
                bail!("depends entries must be non-empty");
            }
        }
        if let Some(path) = &self.skip_unless
            && path.trim().is_empty()
        {
            bail!("skip_unless must be non-empty when set");
        }
        if self.tests.is_empty() {
            bail!("unit must define at least one [[test]]");
        }
        let mut names = HashSet::new();
        for test in &self.tests {
            if test.name.trim().is_empty() || test.name.contains(char::is_whitespace) {
                bail!("test name '{}' must be non-empty without whitespace", test.name);
            }
            if !names.insert(test.name.as_str()) {
                bail!("duplicate test name '{}'", test.name);
            }
            for (index, step) in test.steps.iter().enumerate() {
                step.step
                    .validate()
                    .with_context(|| format!("test '{}' steps[{}] invalid", test.name, index))?;
            }
        }
        Ok(())
    }
}

impl Step {
    fn validate(&self) -> Result<()> {
        match self {
            Step::Property { path, .. } => {
                if path.trim().is_empty() {
                    bail!("property.path must be non-empty");
                }
            }
            Step::FileMatch { path, pattern, .. } => {
                if path.as_os_str().is_empty() {
                    bail!("file_match.path must be non-empty");
                }
                Regex::new(pattern).context("file_match.pattern must be a valid regex")?;
            }
            Step::Fetch { url, .. } => {
                if url.trim().is_empty() {
                    bail!("fetch.url must be non-empty");
                }
            }
            Step::Fail { .. } => {}
        }
        Ok(())
    }
}

/// Discover and load all unit definitions from a directory.
///
/// Returns definitions sorted by name. A missing directory yields none.
/// Errors if duplicate names are found.
pub fn discover_units(dir: &Path) -> Result<Vec<UnitDefinition>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut units = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read units dir {}", dir.display()))? {
        let entry = entry.context("read unit entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        units.push(UnitDefinition::load(&path)?);
    }
    units.sort_by(|left, right| left.name.cmp(&right.name));
    for pair in units.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(anyhow!(
                "duplicate unit name {} ({} and {})",
                pair[0].name,
                pair[0].source.display(),
                pair[1].source.display()
            ));
        }
    }
    Ok(units)
}

fn validate_unit_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("name must be non-empty");
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("name must use [a-z0-9_-] only");
    }
    Ok(())
}

fn line_at(contents: &str, offset: usize) -> u32 {
    let prefix = contents.get(..offset).unwrap_or(contents);
    let newlines = prefix.bytes().filter(|byte| *byte == b'\n').count();
    u32::try_from(newlines + 1).unwrap_or(u32::MAX)
}
