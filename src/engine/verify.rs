use std::collections::BTreeMap;

use log::{debug, warn};

use crate::core::{MigrateError, Result};
use crate::engine::step::{CountPolicy, StepDescriptor};
use crate::store::Store;

/// One table's count reconciliation after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: String,
    pub expected: usize,
    pub actual: usize,
    pub waived: bool,
}

/// Reconciles the new store's row counts against the counts captured from
/// the old store when the step opened.
///
/// Runs after the epilogue and before commit. Only tables present in both
/// snapshot sets are checked; an enforced mismatch aborts the step, a
/// waived one is logged with its declared reason.
pub fn verify_counts(
    step: &StepDescriptor,
    captured: &BTreeMap<String, usize>,
    new: &Store,
) -> Result<Vec<TableCount>> {
    let mut report = Vec::new();

    for table in step.verified_tables() {
        let expected = captured.get(table).copied().unwrap_or(0);
        let actual = new.table(table)?.row_count();

        match step.count_policy(table) {
            CountPolicy::Enforce => {
                if expected != actual {
                    return Err(MigrateError::CountMismatch(
                        table.to_string(),
                        expected,
                        actual,
                    ));
                }
                debug!("Verified table '{}': {} rows", table, actual);
                report.push(TableCount {
                    table: table.to_string(),
                    expected,
                    actual,
                    waived: false,
                });
            }
            CountPolicy::Waive(reason) => {
                if expected != actual {
                    warn!(
                        "Table '{}' count changed {} -> {} ({})",
                        table, expected, actual, reason
                    );
                }
                report.push(TableCount {
                    table: table.to_string(),
                    expected,
                    actual,
                    waived: true,
                });
            }
        }
    }

    Ok(report)
}
