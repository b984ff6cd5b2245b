//! Diagnostic tracing on stderr, kept apart from the report on stdout.
//!
//! The report is always written in full whatever the filter says. Tracing
//! only shows how a run got there: phase transitions, snapshot fallback,
//! skipped units and halts.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVES: &str = "warn";

/// Install the stderr subscriber.
///
/// `RUST_LOG` overrides the default `warn`; `RUST_LOG=hostcheck::run=debug`
/// shows each phase transition and unit start.
pub fn init() -> Result<()> {
    let directives = std::env::var("RUST_LOG").ok();
    tracing_subscriber::registry()
        .with(filter_from(directives.as_deref()))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("install tracing subscriber")
}

/// Filter for `directives`, or the default when unset or unparseable.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
