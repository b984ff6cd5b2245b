//! Sanity checks on the snapshot itself.
//!
//! Declarative units that query state should depend on `snapshot` so a run
//! against placeholder data stops here instead of failing every property.

use crate::core::outcome::MethodResult;
use crate::unit::{TestMethod, TestUnit, UnitContext};

pub const NAME: &str = "snapshot";

pub struct SnapshotUnit;

impl TestUnit for SnapshotUnit {
    fn name(&self) -> &str {
        NAME
    }

    fn methods(&self) -> Vec<TestMethod<'_>> {
        vec![
            TestMethod::new("test_lists_services", lists_services),
            TestMethod::new("test_captured", captured),
        ]
    }
}

fn captured(ctx: &UnitContext<'_>) -> MethodResult {
    ctx.check(
        !ctx.snapshot().is_dummy(),
        "no state snapshot was captured; checks are running against placeholder data",
    )?;
    Ok(ctx.pass())
}

fn lists_services(ctx: &UnitContext<'_>) -> MethodResult {
    let services = ctx.assert_property("services")?;
    ctx.check(
        services.is_array() || services.is_object(),
        format!("services must be a list or map, found {services}"),
    )?;
    Ok(ctx.pass())
}
