//! Stable exit codes for the `hostcheck` CLI.

/// Run completed. Under `--continue` this includes runs with recorded failures.
pub const OK: i32 = 0;
/// Invalid config, malformed unit definition, unknown dependency or cycle.
pub const INVALID: i32 = 1;
/// Halt policy stopped the run on the first failure or error.
pub const HALTED: i32 = 2;
