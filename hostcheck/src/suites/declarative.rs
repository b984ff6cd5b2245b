//! Units built from TOML definitions in the units directory.

use crate::core::outcome::{MethodResult, Signal, Skip};
use crate::core::snapshot::Snapshot;
use crate::io::unit_defs::{Step, TestDefinition, UnitDefinition};
use crate::unit::{TestMethod, TestUnit, UnitContext};

pub struct DeclarativeUnit {
    definition: UnitDefinition,
}

impl DeclarativeUnit {
    pub fn new(definition: UnitDefinition) -> Self {
        Self { definition }
    }

    /// Build the unit, or skip it when its `skip_unless` property is absent.
    pub fn instantiate(definition: UnitDefinition, snapshot: &Snapshot) -> Result<Self, Skip> {
        if let Some(path) = &definition.skip_unless
            && snapshot.lookup(path).is_err()
        {
            return Err(Skip::new(format!("requires property {path}")));
        }
        Ok(Self::new(definition))
    }
}

impl TestUnit for DeclarativeUnit {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.definition.depends.clone()
    }

    fn methods(&self) -> Vec<TestMethod<'_>> {
        self.definition
            .tests
            .iter()
            .map(|test| TestMethod::new(test.name.clone(), move |ctx| run_test(ctx, test)))
            .collect()
    }
}

fn run_test(ctx: &UnitContext<'_>, test: &TestDefinition) -> MethodResult {
    if test.steps.is_empty() {
        return Err(Signal::Incomplete);
    }
    for step in &test.steps {
        run_step(ctx, &step.step).map_err(|signal| signal.at(step.location.clone()))?;
    }
    Ok(ctx.pass())
}

fn run_step(ctx: &UnitContext<'_>, step: &Step) -> Result<(), Signal> {
    match step {
        Step::Property {
            path,
            equals: None,
        } => {
            ctx.assert_property(path)?;
        }
        Step::Property {
            path,
            equals: Some(expected),
        } => {
            ctx.assert_property_eq(path, expected)?;
        }
        Step::FileMatch {
            path,
            pattern,
            expect,
        } => {
            let captured = ctx.file_match(path, pattern)?;
            if let Some(expected) = expect
                && captured != *expected
            {
                return ctx.fail(format!(
                    "{} in {} captured '{captured}', expected '{expected}'",
                    pattern,
                    path.display()
                ));
            }
        }
        Step::Fetch {
            url,
            params,
            contains,
        } => {
            let pairs: Vec<(&str, &str)> = params
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect();
            let body = ctx.assert_fetch(url, &pairs)?;
            if let Some(needle) = contains
                && !body.contains(needle.as_str())
            {
                return ctx.fail(format!("fetch {url}: body does not contain '{needle}'"));
            }
        }
        Step::Fail { message } => return ctx.fail(message.clone()),
    }
    Ok(())
}
