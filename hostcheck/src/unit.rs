//! Test unit contract and the assertion helpers available to test methods.
//!
//! A unit is a named group of test methods with declared dependencies on
//! other units. Methods receive a [`UnitContext`], a read-only handle onto the
//! snapshot and the HTTP fetcher, and must finish with `Ok(ctx.pass())` to
//! count as passed. Helpers return `Result<_, Signal>` so a failed assertion
//! short-circuits the method with `?`.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde_json::Value;

use crate::core::graph::UnitDescriptor;
use crate::core::outcome::{MethodResult, Pass, Signal, SourceLocation};
use crate::core::snapshot::Snapshot;
use crate::io::fetch::{FetchResult, Fetcher};

type MethodFn<'a> = Box<dyn Fn(&UnitContext<'_>) -> MethodResult + 'a>;

/// A named, callable test method.
pub struct TestMethod<'a> {
    name: String,
    run: MethodFn<'a>,
}

impl<'a> TestMethod<'a> {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&UnitContext<'_>) -> MethodResult + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, ctx: &UnitContext<'_>) -> MethodResult {
        (self.run)(ctx)
    }
}

/// Base contract implemented by every test suite.
pub trait TestUnit {
    /// Unique unit identity.
    fn name(&self) -> &str;

    /// Units that must run before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Test methods in any order; the runner executes them lexically.
    fn methods(&self) -> Vec<TestMethod<'_>>;

    fn descriptor(&self) -> UnitDescriptor {
        UnitDescriptor {
            name: self.name().to_string(),
            dependencies: self.dependencies(),
            methods: sorted_methods(self)
                .iter()
                .map(|method| method.name().to_string())
                .collect(),
        }
    }
}

/// Methods of `unit` in lexical order of their names.
pub fn sorted_methods<U: TestUnit + ?Sized>(unit: &U) -> Vec<TestMethod<'_>> {
    let mut methods = unit.methods();
    methods.sort_by(|left, right| left.name.cmp(&right.name));
    methods
}

/// Read-only handle passed to every test method of a run.
pub struct UnitContext<'a> {
    snapshot: &'a Snapshot,
    fetcher: &'a dyn Fetcher,
    assertions: Cell<usize>,
}

impl<'a> UnitContext<'a> {
    pub fn new(snapshot: &'a Snapshot, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            snapshot,
            fetcher,
            assertions: Cell::new(0),
        }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    /// Assertion-style helper calls made so far.
    pub fn assertions(&self) -> usize {
        self.assertions.get()
    }

    fn count(&self) {
        self.assertions.set(self.assertions.get() + 1);
    }

    /// The explicit success signal.
    pub fn pass(&self) -> Pass {
        Pass::new()
    }

    /// Explicit failure, e.g. `return ctx.fail("unexpected value")`.
    #[track_caller]
    pub fn fail<T>(&self, message: impl Into<String>) -> Result<T, Signal> {
        self.count();
        Err(Signal::failure(message))
    }

    /// Fail with `message` unless `condition` holds.
    #[track_caller]
    pub fn check(&self, condition: bool, message: impl Into<String>) -> Result<(), Signal> {
        self.count();
        if condition {
            Ok(())
        } else {
            Err(Signal::failure(message))
        }
    }

    /// Look up a dot-separated path in the snapshot.
    #[track_caller]
    pub fn assert_property(&self, path: &str) -> Result<&'a Value, Signal> {
        self.count();
        let location = SourceLocation::caller();
        self.snapshot
            .lookup(path)
            .map_err(|missing| Signal::failure(missing.to_string()).at(location))
    }

    /// Look up a property and require it to equal `expected`.
    #[track_caller]
    pub fn assert_property_eq(&self, path: &str, expected: &Value) -> Result<&'a Value, Signal> {
        let actual = self.assert_property(path)?;
        if actual != expected {
            return Err(Signal::failure(format!(
                "property {path} is {actual}, expected {expected}"
            )));
        }
        Ok(actual)
    }

    /// First capture group of `pattern` in the file (whole match without groups).
    #[track_caller]
    pub fn file_match(&self, path: impl AsRef<Path>, pattern: &str) -> Result<String, Signal> {
        let mut captures = self.captures(path.as_ref(), pattern)?;
        Ok(captures.swap_remove(0))
    }

    /// Every capture group of the first match (whole match without groups).
    #[track_caller]
    pub fn file_matches(
        &self,
        path: impl AsRef<Path>,
        pattern: &str,
    ) -> Result<Vec<String>, Signal> {
        self.captures(path.as_ref(), pattern)
    }

    #[track_caller]
    fn captures(&self, path: &Path, pattern: &str) -> Result<Vec<String>, Signal> {
        self.count();
        let location = SourceLocation::caller();
        let regex = Regex::new(pattern).map_err(|err| {
            Signal::error(format!("invalid pattern {pattern}: {err}")).at(location.clone())
        })?;
        let contents = fs::read_to_string(path).map_err(|err| {
            Signal::error(format!("read {}: {err}", path.display())).at(location.clone())
        })?;
        let Some(found) = regex.captures(&contents) else {
            return Err(Signal::failure(format!(
                "pattern {pattern} not found in {}",
                path.display()
            ))
            .at(location));
        };
        if found.len() == 1 {
            return Ok(vec![found[0].to_string()]);
        }
        Ok(found
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect())
    }

    /// GET `url`; never fails on its own.
    pub fn fetch(&self, url: &str, params: &[(&str, &str)]) -> FetchResult {
        self.fetcher.get(url, params)
    }

    /// GET `url` and require a 2xx response, returning its body.
    #[track_caller]
    pub fn assert_fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<String, Signal> {
        self.count();
        match self.fetch(url, params) {
            FetchResult::Body(body) => Ok(body),
            FetchResult::Status(status) => {
                Err(Signal::failure(format!("fetch {url}: got status {status}")))
            }
            FetchResult::Transport(err) => {
                Err(Signal::failure(format!("fetch {url}: transport error: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::outcome::OutcomeKind;
    use crate::test_support::ScriptedFetcher;
    use serde_json::json;

    fn with_ctx<R>(snapshot: Value, f: impl FnOnce(&UnitContext<'_>) -> R) -> R {
        let snapshot = Snapshot::new(snapshot);
        let fetcher = ScriptedFetcher::default();
        let ctx = UnitContext::new(&snapshot, &fetcher);
        f(&ctx)
    }

    #[test]
    fn assert_property_returns_leaf() {
        with_ctx(json!({ "a": { "b": { "c": 42 } } }), |ctx| {
            assert_eq!(ctx.assert_property("a.b.c"), Ok(&json!(42)));
            assert_eq!(ctx.assertions(), 1);
        });
    }

    #[test]
    fn assert_property_fails_naming_path() {
        with_ctx(json!({ "a": { "b": {} } }), |ctx| {
            let signal = ctx.assert_property("a.b.c").expect_err("missing");
            assert_eq!(signal.kind(), OutcomeKind::Failure);
            assert_eq!(signal.to_string(), "missing property a.b.c");
            let location = signal.location().expect("location");
            assert!(location.file.ends_with("unit.rs"));
        });
    }

    #[test]
    fn assert_property_eq_compares_values() {
        with_ctx(json!({ "port": 443 }), |ctx| {
            assert!(ctx.assert_property_eq("port", &json!(443)).is_ok());
            let signal = ctx
                .assert_property_eq("port", &json!(80))
                .expect_err("mismatch");
            assert_eq!(signal.to_string(), "property port is 443, expected 80");
        });
    }

    #[test]
    fn file_match_returns_first_group() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nginx.conf");
        fs::write(&path, "server {\n  listen 443 ssl;\n  listen 80;\n}\n").expect("write");
        with_ctx(json!({}), |ctx| {
            assert_eq!(
                ctx.file_match(&path, r"listen\s+(\d+)").expect("match"),
                "443"
            );
            assert_eq!(
                ctx.file_matches(&path, r"listen\s+(\d+)\s*(ssl)?").expect("match"),
                vec!["443".to_string(), "ssl".to_string()]
            );
            assert_eq!(ctx.file_match(&path, r"server").expect("match"), "server");
            assert_eq!(ctx.assertions(), 3);
        });
    }

    #[test]
    fn file_match_failure_names_pattern_and_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sshd_config");
        fs::write(&path, "PermitRootLogin no\n").expect("write");
        with_ctx(json!({}), |ctx| {
            let signal = ctx
                .file_match(&path, r"PasswordAuthentication (\w+)")
                .expect_err("no match");
            assert_eq!(signal.kind(), OutcomeKind::Failure);
            let message = signal.to_string();
            assert!(message.contains(r"PasswordAuthentication (\w+)"));
            assert!(message.contains("sshd_config"));
        });
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        with_ctx(json!({}), |ctx| {
            let signal = ctx
                .file_match(temp.path().join("absent"), "x")
                .expect_err("missing file");
            assert_eq!(signal.kind(), OutcomeKind::Error);
        });
    }

    #[test]
    fn assert_fetch_distinguishes_status_from_transport() {
        let snapshot = Snapshot::new(json!({}));
        let fetcher = ScriptedFetcher::default()
            .respond("http://ok/", FetchResult::Body("healthy".to_string()))
            .respond("http://down/", FetchResult::Status(503))
            .respond("http://gone/", FetchResult::Transport("refused".to_string()));
        let ctx = UnitContext::new(&snapshot, &fetcher);

        assert_eq!(ctx.assert_fetch("http://ok/", &[]).expect("body"), "healthy");
        let status = ctx.assert_fetch("http://down/", &[]).expect_err("status");
        assert_eq!(status.to_string(), "fetch http://down/: got status 503");
        let transport = ctx.assert_fetch("http://gone/", &[]).expect_err("transport");
        assert_eq!(
            transport.to_string(),
            "fetch http://gone/: transport error: refused"
        );
        assert_eq!(ctx.fetch("http://down/", &[]), FetchResult::Status(503));
        assert_eq!(ctx.assertions(), 3);
    }

    #[test]
    fn fail_and_check_count_assertions() {
        with_ctx(json!({}), |ctx| {
            assert!(ctx.check(true, "fine").is_ok());
            let signal = ctx.fail::<()>("explicit").expect_err("fail");
            assert_eq!(signal.kind(), OutcomeKind::Failure);
            assert_eq!(ctx.assertions(), 2);
        });
    }
}
