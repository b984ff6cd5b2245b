//! Dependency-ordered validation of a provisioned host's configuration state.
//!
//! A run loads a read-only snapshot of the host's observed state, discovers
//! test units (built-in suites plus declarative definitions), orders them by
//! their declared dependencies, and executes every test method in a
//! deterministic order. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (outcome classification,
//!   dependency resolution, report tallying, snapshot lookup). No I/O.
//! - **[`io`]**: Side-effecting operations (config files, snapshot loading,
//!   unit definition discovery, HTTP). Isolated behind small seams so tests can
//!   substitute scripted implementations.
//!
//! Orchestration modules ([`registry`], [`run`]) coordinate the two to
//! implement the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod registry;
pub mod run;
pub mod suites;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod unit;
