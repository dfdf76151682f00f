//! The compiled-in version history: one module per schema version.
//!
//! Each version module derives its table set from the previous version's
//! (shapes that did not change are shared, not re-frozen) and, from v2 on,
//! contributes the step descriptor that carries a store up from the
//! previous version. `registry()` and `plan()` expose the assembled
//! history; both are built and validated once, lazily.

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::core::Result;
use crate::engine::MigrationPlan;
use crate::schema::{SnapshotRegistry, TableSnapshot};

mod v1;
mod v2;
mod v3;
mod v4;
mod v5;
mod v6;

/// The schema version this build writes.
pub const CURRENT_VERSION: u32 = 6;

/// The oldest schema version this build still migrates from.
pub const OLDEST_SUPPORTED_VERSION: u32 = 1;

lazy_static! {
    static ref CATALOG: (SnapshotRegistry, MigrationPlan) =
        build_catalog().expect("built-in version history must validate");
}

/// Every table shape of every supported version.
pub fn registry() -> &'static SnapshotRegistry {
    &CATALOG.0
}

/// The validated step chain from `OLDEST_SUPPORTED_VERSION` to
/// `CURRENT_VERSION`.
pub fn plan() -> &'static MigrationPlan {
    &CATALOG.1
}

type Tables = BTreeMap<String, Arc<TableSnapshot>>;

fn build_catalog() -> Result<(SnapshotRegistry, MigrationPlan)> {
    let t1: Tables = v1::tables();
    let t2: Tables = v2::tables(&t1);
    let t3: Tables = v3::tables(&t2);
    let t4: Tables = v4::tables(&t3);
    let t5: Tables = v5::tables(&t4);
    let t6: Tables = v6::tables(&t5);

    let mut registry = SnapshotRegistry::new();
    registry.register_version(1, t1.clone())?;
    registry.register_version(2, t2.clone())?;
    registry.register_version(3, t3.clone())?;
    registry.register_version(4, t4.clone())?;
    registry.register_version(5, t5.clone())?;
    registry.register_version(6, t6.clone())?;

    let plan = MigrationPlan::new(CURRENT_VERSION)
        .with_oldest_supported(OLDEST_SUPPORTED_VERSION)
        .with_step(v2::step(t1, t2.clone()))?
        .with_step(v3::step(t2, t3.clone()))?
        .with_step(v4::step(t3, t4.clone()))?
        .with_step(v5::step(t4, t5.clone()))?
        .with_step(v6::step(t5, t6))?;

    Ok((registry, plan))
}
