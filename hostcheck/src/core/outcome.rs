//! Outcome vocabulary for test method execution.
//!
//! A test method returns [`MethodResult`]: `Ok(Pass)` when it explicitly
//! signalled success, or a [`Signal`] describing why it did not. The runner
//! never inspects anything else, so every executed method maps to exactly one
//! [`OutcomeKind`].

use std::fmt;
use std::panic::Location;

use thiserror::Error;

/// Return type of every test method.
pub type MethodResult = Result<Pass, Signal>;

/// Classified result of one method execution, or of one excluded unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Pass,
    Failure,
    Error,
    Skip,
}

impl OutcomeKind {
    /// Label used in report lines.
    pub fn label(self) -> &'static str {
        match self {
            OutcomeKind::Pass => "PASS",
            OutcomeKind::Failure => "FAIL",
            OutcomeKind::Error => "ERROR",
            OutcomeKind::Skip => "SKIP",
        }
    }

    /// True for outcomes that stop a run under the halt policy.
    pub fn is_problem(self) -> bool {
        matches!(self, OutcomeKind::Failure | OutcomeKind::Error)
    }
}

/// File and line a signal originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the code calling the current `#[track_caller]` chain.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Proof that a test method reached an explicit pass.
///
/// Only [`crate::unit::UnitContext::pass`] hands these out, so a method cannot
/// report success without asking for it.
#[derive(Debug, PartialEq, Eq)]
pub struct Pass {
    _private: (),
}

impl Pass {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Why a test method did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Signal {
    /// A checked assertion was found false.
    #[error("{message}")]
    Failure {
        message: String,
        location: Option<SourceLocation>,
    },
    /// Anything unexpected: I/O, transport, panics.
    #[error("{message}")]
    Error {
        message: String,
        location: Option<SourceLocation>,
    },
    /// The method finished without signalling pass.
    #[error("test returned without signalling pass")]
    Incomplete,
}

impl Signal {
    #[track_caller]
    pub fn failure(message: impl Into<String>) -> Self {
        Signal::Failure {
            message: message.into(),
            location: Some(SourceLocation::caller()),
        }
    }

    #[track_caller]
    pub fn error(message: impl Into<String>) -> Self {
        Signal::Error {
            message: message.into(),
            location: Some(SourceLocation::caller()),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Signal::Failure { .. } => OutcomeKind::Failure,
            Signal::Error { .. } | Signal::Incomplete => OutcomeKind::Error,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Signal::Failure { location, .. } | Signal::Error { location, .. } => location.as_ref(),
            Signal::Incomplete => None,
        }
    }

    /// Replace the originating location (used for data-defined tests).
    pub fn at(self, at: SourceLocation) -> Self {
        match self {
            Signal::Failure { message, .. } => Signal::Failure {
                message,
                location: Some(at),
            },
            Signal::Error { message, .. } => Signal::Error {
                message,
                location: Some(at),
            },
            Signal::Incomplete => Signal::Incomplete,
        }
    }
}

impl From<anyhow::Error> for Signal {
    #[track_caller]
    fn from(err: anyhow::Error) -> Self {
        Signal::error(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Signal {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Signal::error(err.to_string())
    }
}

/// Reason a whole unit was excluded during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Skip {
    pub reason: String,
}

impl Skip {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Map a method result onto exactly one outcome kind.
pub fn classify(result: &MethodResult) -> OutcomeKind {
    match result {
        Ok(_) => OutcomeKind::Pass,
        Err(signal) => signal.kind(),
    }
}

/// Immutable record of one outcome, kept in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub unit: String,
    /// `None` for skip records, which cover a whole unit.
    pub method: Option<String>,
    pub kind: OutcomeKind,
    pub message: Option<String>,
    pub location: Option<SourceLocation>,
}

impl OutcomeRecord {
    pub fn from_result(unit: &str, method: &str, result: MethodResult) -> Self {
        let kind = classify(&result);
        let (message, location) = match result {
            Ok(_) => (None, None),
            Err(signal) => {
                let location = signal.location().cloned();
                (Some(signal.to_string()), location)
            }
        };
        Self {
            unit: unit.to_string(),
            method: Some(method.to_string()),
            kind,
            message,
            location,
        }
    }

    pub fn skipped(unit: &str, skip: &Skip) -> Self {
        Self {
            unit: unit.to_string(),
            method: None,
            kind: OutcomeKind::Skip,
            message: Some(skip.reason.clone()),
            location: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_each_signal_to_one_kind() {
        assert_eq!(classify(&Ok(Pass::new())), OutcomeKind::Pass);
        assert_eq!(
            classify(&Err(Signal::failure("x"))),
            OutcomeKind::Failure
        );
        assert_eq!(classify(&Err(Signal::error("x"))), OutcomeKind::Error);
        assert_eq!(classify(&Err(Signal::Incomplete)), OutcomeKind::Error);
    }

    #[test]
    fn failure_captures_caller_location() {
        let signal = Signal::failure("boom");
        let location = signal.location().expect("location");
        assert!(location.file.ends_with("outcome.rs"));
        assert!(location.line > 0);
    }

    #[test]
    fn anyhow_errors_become_error_signals() {
        let signal: Signal = anyhow::anyhow!("disk on fire").into();
        assert_eq!(signal.kind(), OutcomeKind::Error);
        assert_eq!(signal.to_string(), "disk on fire");
    }

    #[test]
    fn record_carries_message_and_location() {
        let record = OutcomeRecord::from_result("web", "test_port", Err(Signal::failure("nope")));
        assert_eq!(record.kind, OutcomeKind::Failure);
        assert_eq!(record.message.as_deref(), Some("nope"));
        assert!(record.location.is_some());

        let record = OutcomeRecord::from_result("web", "test_port", Ok(Pass::new()));
        assert_eq!(record.kind, OutcomeKind::Pass);
        assert_eq!(record.message, None);
    }

    #[test]
    fn incomplete_is_reported_as_error_without_location() {
        let record = OutcomeRecord::from_result("web", "test_port", Err(Signal::Incomplete));
        assert_eq!(record.kind, OutcomeKind::Error);
        assert_eq!(
            record.message.as_deref(),
            Some("test returned without signalling pass")
        );
        assert_eq!(record.location, None);
    }

    #[test]
    fn relocating_keeps_message() {
        let signal = Signal::failure("bad").at(SourceLocation::new("units/web.toml", 7));
        assert_eq!(signal.to_string(), "bad");
        assert_eq!(
            signal.location(),
            Some(&SourceLocation::new("units/web.toml", 7))
        );
    }
}
