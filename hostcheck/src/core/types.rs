//! Shared deterministic types for run control.
//!
//! These types define stable contracts between the runner, the report and the
//! CLI. They must not depend on external state.

/// What the runner does after a method records a failure or an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Stop scheduling further methods and units immediately.
    #[default]
    Halt,
    /// Keep going and report every outcome.
    Continue,
}

impl Policy {
    /// Map the `--continue` switch onto a policy.
    pub fn from_continue_flag(keep_going: bool) -> Self {
        if keep_going {
            Policy::Continue
        } else {
            Policy::Halt
        }
    }
}

/// Terminal state of an executed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every scheduled method ran.
    Completed,
    /// The halt policy stopped the run after a failure or error.
    Halted,
}
