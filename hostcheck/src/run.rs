//! Run orchestration.
//!
//! Drives one run through its phases: load the snapshot and instantiate
//! units, resolve dependency order, execute methods under the failure policy,
//! then render the report.

use std::any::Any;
use std::collections::HashMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::graph::{UnitDescriptor, resolve};
use crate::core::outcome::{MethodResult, OutcomeRecord, Signal};
use crate::core::report::Report;
use crate::core::snapshot::Snapshot;
use crate::core::types::Policy;
use crate::io::fetch::Fetcher;
use crate::io::snapshot_store::load_snapshot;
use crate::registry::{Discovery, Registry};
use crate::unit::{TestMethod, TestUnit, UnitContext, sorted_methods};

/// Lifecycle of a run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Resolving,
    Executing,
    Reporting,
    Terminated,
}

/// Units in execution order plus the skip records from discovery.
pub struct Plan {
    pub units: Vec<Box<dyn TestUnit>>,
    pub skipped: Vec<OutcomeRecord>,
}

impl Plan {
    /// Order discovered units so every unit follows its dependencies.
    pub fn from_discovery(discovery: Discovery) -> Result<Self> {
        let descriptors: Vec<UnitDescriptor> =
            discovery.units.iter().map(|unit| unit.descriptor()).collect();
        let order = resolve(&descriptors).context("resolve unit dependencies")?;
        let mut by_name: HashMap<String, Box<dyn TestUnit>> = discovery
            .units
            .into_iter()
            .map(|unit| (unit.name().to_string(), unit))
            .collect();
        let units = order
            .iter()
            .map(|name| {
                by_name
                    .remove(name)
                    .ok_or_else(|| anyhow!("resolved unit {name} was never discovered"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            units,
            skipped: discovery.skipped,
        })
    }

    pub fn descriptors(&self) -> Vec<UnitDescriptor> {
        self.units.iter().map(|unit| unit.descriptor()).collect()
    }
}

pub struct Runner<'a> {
    fetcher: &'a dyn Fetcher,
    policy: Policy,
    phase: Phase,
}

impl<'a> Runner<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, policy: Policy) -> Self {
        Self {
            fetcher,
            policy,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Load the snapshot, instantiate units and resolve their order.
    pub fn prepare(
        &mut self,
        registry: &Registry,
        snapshot_path: &Path,
    ) -> Result<(Snapshot, Plan)> {
        self.enter(Phase::Loading);
        let snapshot = load_snapshot(snapshot_path);
        let plan = registry.discover(&snapshot).and_then(|discovery| {
            self.enter(Phase::Resolving);
            Plan::from_discovery(discovery)
        });
        match plan {
            Ok(plan) => Ok((snapshot, plan)),
            Err(err) => {
                self.enter(Phase::Terminated);
                Err(err)
            }
        }
    }

    /// Run every planned method, honoring the failure policy.
    pub fn execute(&mut self, plan: &Plan, snapshot: &Snapshot) -> Report {
        self.enter(Phase::Executing);
        let ctx = UnitContext::new(snapshot, self.fetcher);
        let mut report = Report::default();
        for record in &plan.skipped {
            report.record(record.clone());
        }

        'units: for unit in &plan.units {
            report.units += 1;
            debug!(unit = unit.name(), "unit started");
            for method in sorted_methods(&**unit) {
                let result = invoke(&method, &ctx);
                let record = OutcomeRecord::from_result(unit.name(), method.name(), result);
                let kind = record.kind;
                report.record(record);
                if kind.is_problem() && self.policy == Policy::Halt {
                    warn!(
                        unit = unit.name(),
                        method = method.name(),
                        kind = kind.label(),
                        "halting run"
                    );
                    report.halted = true;
                    break 'units;
                }
            }
        }

        report.assertions = ctx.assertions();
        report
    }

    /// Full run: prepare, execute, then write the report to `out`.
    #[instrument(skip_all, fields(policy = ?self.policy))]
    pub fn run(
        &mut self,
        registry: &Registry,
        snapshot_path: &Path,
        out: &mut dyn Write,
    ) -> Result<Report> {
        info!(snapshot = %snapshot_path.display(), "run started");
        let (snapshot, plan) = self.prepare(registry, snapshot_path)?;
        let report = self.execute(&plan, &snapshot);

        self.enter(Phase::Reporting);
        let rendered = report.render(out).context("write report");
        self.enter(Phase::Terminated);
        rendered?;

        info!(
            tests = report.tests,
            failures = report.failures,
            errors = report.errors,
            halted = report.halted,
            "run finished"
        );
        Ok(report)
    }
}

/// Call one method, turning a panic into an error outcome.
fn invoke(method: &TestMethod<'_>, ctx: &UnitContext<'_>) -> MethodResult {
    match panic::catch_unwind(AssertUnwindSafe(|| method.call(ctx))) {
        Ok(result) => result,
        Err(payload) => Err(Signal::Error {
            message: format!("panicked: {}", panic_message(payload.as_ref())),
            location: None,
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::ResolveError;
    use crate::core::outcome::OutcomeKind;
    use crate::core::types::RunStatus;
    use crate::test_support::{Script, ScriptedFetcher, ScriptedUnit, TestHost, registry_of};
    use serde_json::json;

    fn run_units(units: Vec<ScriptedUnit>, policy: Policy) -> (Report, String) {
        let host = TestHost::new().expect("host");
        host.write_snapshot(&json!({ "services": [], "a": { "b": { "c": 42 } } }))
            .expect("snapshot");
        let fetcher = ScriptedFetcher::default();
        let mut runner = Runner::new(&fetcher, policy);
        let mut out = Vec::new();
        let report = runner
            .run(&registry_of(units), &host.snapshot_path(), &mut out)
            .expect("run");
        assert_eq!(runner.phase(), Phase::Terminated);
        (report, String::from_utf8(out).expect("utf8"))
    }

    fn executed(report: &Report) -> Vec<String> {
        report
            .records
            .iter()
            .map(|record| match &record.method {
                Some(method) => format!("{}::{method}", record.unit),
                None => format!("{} (skipped)", record.unit),
            })
            .collect()
    }

    fn unit_a() -> ScriptedUnit {
        ScriptedUnit::new("a")
            .method("testTwo", Script::Pass)
            .method("testOne", Script::Pass)
    }

    fn unit_b() -> ScriptedUnit {
        ScriptedUnit::new("b")
            .depends_on("a")
            .method("testAlpha", Script::Pass)
    }

    #[test]
    fn dependencies_run_first_and_methods_lexically() {
        let (report, _) = run_units(vec![unit_b(), unit_a()], Policy::Halt);
        assert_eq!(
            executed(&report),
            vec!["a::testOne", "a::testTwo", "b::testAlpha"]
        );
        assert_eq!(report.passes, 3);
        assert_eq!(report.tests, 3);
        assert_eq!(report.units, 2);
        assert_eq!(report.status(), RunStatus::Completed);
    }

    #[test]
    fn halt_stops_after_first_failure() {
        let units = vec![
            ScriptedUnit::new("a")
                .method("test_1", Script::Fail("first"))
                .method("test_2", Script::Pass),
            ScriptedUnit::new("b").method("test_1", Script::Pass),
        ];
        let (report, out) = run_units(units, Policy::Halt);
        assert_eq!(executed(&report), vec!["a::test_1"]);
        assert_eq!(report.failures, 1);
        assert_eq!(report.units, 1);
        assert_eq!(report.status(), RunStatus::Halted);
        assert!(out.contains("(halted)"), "{out}");
    }

    #[test]
    fn continue_records_every_outcome() {
        let units = vec![
            ScriptedUnit::new("a")
                .method("test_1", Script::Fail("first"))
                .method("test_2", Script::Error("second"))
                .method("test_3", Script::Pass),
            ScriptedUnit::new("b").method("test_1", Script::Fail("third")),
        ];
        let (report, out) = run_units(units, Policy::Continue);
        assert_eq!(report.tests, 4);
        assert_eq!(report.failures, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.passes, 1);
        assert_eq!(report.status(), RunStatus::Completed);
        assert!(
            out.ends_with("4 tests, 2 assertions, 1 passes, 2 failures, 1 errors, 0 skips\n"),
            "{out}"
        );
    }

    fn assert_halted_on_error(first: Script, message: &str) {
        let units = vec![
            ScriptedUnit::new("a")
                .method("test_1", first)
                .method("test_2", Script::Pass),
            ScriptedUnit::new("b").method("test_1", Script::Pass),
        ];
        let (report, out) = run_units(units, Policy::Halt);
        assert_eq!(executed(&report), vec!["a::test_1"]);
        assert_eq!(report.errors, 1);
        assert_eq!(report.passes, 0);
        assert_eq!(report.records[0].message.as_deref(), Some(message));
        assert_eq!(report.status(), RunStatus::Halted);
        assert!(out.ends_with("(halted)\n"), "{out}");
    }

    #[test]
    fn halt_stops_after_first_error() {
        assert_halted_on_error(Script::Error("disk unreadable"), "disk unreadable");
    }

    #[test]
    fn halt_stops_after_panic() {
        assert_halted_on_error(Script::Panic("boom"), "panicked: boom");
    }

    #[test]
    fn halt_stops_after_incomplete_method() {
        assert_halted_on_error(
            Script::Incomplete,
            "test returned without signalling pass",
        );
    }

    #[test]
    fn panics_and_incomplete_methods_are_errors() {
        let units = vec![
            ScriptedUnit::new("a")
                .method("test_panics", Script::Panic("boom"))
                .method("test_silent", Script::Incomplete),
        ];
        let (report, _) = run_units(units, Policy::Continue);
        assert_eq!(report.errors, 2);
        assert_eq!(report.records[0].message.as_deref(), Some("panicked: boom"));
        assert_eq!(
            report.records[1].message.as_deref(),
            Some("test returned without signalling pass")
        );
    }

    #[test]
    fn property_assertions_count() {
        let units = vec![
            ScriptedUnit::new("a")
                .method("test_present", Script::Property("a.b.c"))
                .method("test_absent", Script::Property("a.b.d")),
        ];
        let (report, _) = run_units(units, Policy::Continue);
        assert_eq!(report.assertions, 2);
        assert_eq!(report.passes, 1);
        assert_eq!(report.records[0].message.as_deref(), Some("missing property a.b.d"));
    }

    #[test]
    fn skipped_units_are_reported_not_executed() {
        let mut registry = registry_of(vec![unit_b()]);
        registry.register("a", |_| Err(crate::core::outcome::Skip::new("not applicable")));
        let fetcher = ScriptedFetcher::default();
        let mut runner = Runner::new(&fetcher, Policy::Halt);
        let mut out = Vec::new();
        let host = TestHost::new().expect("host");
        let report = runner
            .run(&registry, &host.snapshot_path(), &mut out)
            .expect("run");
        assert_eq!(executed(&report), vec!["a (skipped)", "b (skipped)"]);
        assert_eq!(report.skips, 2);
        assert_eq!(report.tests, 0);
        assert_eq!(report.status(), RunStatus::Completed);
    }

    #[test]
    fn dummy_snapshot_fails_cleanly() {
        let fetcher = ScriptedFetcher::default();
        let mut runner = Runner::new(&fetcher, Policy::Continue);
        let registry = registry_of(vec![
            ScriptedUnit::new("web").method("test_port", Script::Property("services.nginx.port")),
        ]);
        let host = TestHost::new().expect("host");
        let mut out = Vec::new();
        let report = runner
            .run(&registry, &host.snapshot_path(), &mut out)
            .expect("run");
        assert_eq!(report.failures, 1);
        assert_eq!(
            report.records[0].message.as_deref(),
            Some("missing property services.nginx.port")
        );
    }

    #[test]
    fn cycle_aborts_before_execution() {
        let registry = registry_of(vec![
            ScriptedUnit::new("a").depends_on("b").method("test_x", Script::Pass),
            ScriptedUnit::new("b").depends_on("a").method("test_x", Script::Pass),
        ]);
        let fetcher = ScriptedFetcher::default();
        let mut runner = Runner::new(&fetcher, Policy::Halt);
        let host = TestHost::new().expect("host");
        let mut out = Vec::new();
        let err = runner
            .run(&registry, &host.snapshot_path(), &mut out)
            .err()
            .expect("cycle");
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::Cycle { .. })
        ));
        assert!(out.is_empty());
        assert_eq!(runner.phase(), Phase::Terminated);
    }

    #[test]
    fn unknown_dependency_aborts() {
        let registry = registry_of(vec![
            ScriptedUnit::new("a").depends_on("ghost").method("test_x", Script::Pass),
        ]);
        let fetcher = ScriptedFetcher::default();
        let mut runner = Runner::new(&fetcher, Policy::Halt);
        let host = TestHost::new().expect("host");
        let err = runner
            .prepare(&registry, &host.snapshot_path())
            .err()
            .expect("unknown");
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn failure_kinds_are_recorded_in_order() {
        let units = vec![ScriptedUnit::new("a").method("test_1", Script::Fail("x"))];
        let (report, _) = run_units(units, Policy::Continue);
        assert_eq!(report.records[0].kind, OutcomeKind::Failure);
    }
}
