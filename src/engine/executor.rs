use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, info};

use crate::appdata::AppData;
use crate::assets::AssetMigrator;
use crate::core::{MigrateError, Result};
use crate::engine::step::{ColumnRule, StepDescriptor, TableTransform};
use crate::engine::verify::{TableCount, verify_counts};
use crate::engine::StepContext;
use crate::schema::TableSnapshot;
use crate::store::{DualStoreSession, Store};

/// What one executed step did, table by table.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub from_version: u32,
    pub to_version: u32,
    pub tables: Vec<TableCount>,
}

/// Drives one step through its fixed pipeline: capture counts, prologue,
/// per-table transforms in dependency order, epilogue, count verification.
///
/// The new store only exists in memory here; nothing reaches disk until the
/// caller commits the returned store. An error at any stage therefore
/// leaves the on-disk state exactly as it was.
pub struct StepExecutor;

impl StepExecutor {
    pub fn apply(
        step: &StepDescriptor,
        mut session: DualStoreSession,
        assets: &mut AssetMigrator,
        appdata: &AppData,
    ) -> Result<(Store, StepReport)> {
        info!(
            "Performing migration {} -> {}",
            step.version(),
            step.target_version()
        );

        let captured = session.old().counts();
        let order = dependency_order(step.to_snapshots())?;

        let (old, new) = session.split();
        let mut ctx = StepContext::new(step.version(), old, new, assets, appdata);

        if let Some(hook) = step.prologue() {
            hook(&mut ctx)?;
        }

        for table in &order {
            match step.transform_for(table) {
                // Introduced table: stays empty unless a hook fills it.
                None => continue,
                Some(TableTransform::CopyThrough) => {
                    let count = ctx.copy_table(table).map_err(|e| e.in_table(table))?;
                    debug!("* {} copied ({} rows)", table, count);
                }
                Some(TableTransform::Rules(rules)) => {
                    apply_rules(&mut ctx, table, rules).map_err(|e| e.in_table(table))?;
                }
                Some(TableTransform::Custom(transform)) => {
                    transform(&mut ctx).map_err(|e| e.in_table(table))?;
                }
            }
        }

        if let Some(hook) = step.epilogue() {
            hook(&mut ctx)?;
        }
        drop(ctx);

        let tables = verify_counts(step, &captured, session.new_store())?;
        let report = StepReport {
            from_version: step.version(),
            to_version: step.target_version(),
            tables,
        };
        Ok((session.into_new(), report))
    }
}

fn apply_rules(
    ctx: &mut StepContext,
    table: &str,
    rules: &[(String, ColumnRule)],
) -> Result<()> {
    let sources = ctx.old_rows(table)?;
    let count = sources.len();

    for source in sources {
        let mut row = ctx.new_row(table)?.copy_common(&source);
        for (column, rule) in rules {
            row = match rule {
                ColumnRule::Copy => row.set(column, source.get(column)?.clone())?,
                ColumnRule::RenameFrom(old_name) => {
                    row.set(column, source.get(old_name)?.clone())?
                }
                ColumnRule::Fill(value) => row.set(column, value.clone())?,
                ColumnRule::Default => row.reset(column)?,
                ColumnRule::Compute(compute) => match compute(ctx, &source)? {
                    Some(value) => row.set(column, value)?,
                    None => row,
                },
            };
        }
        ctx.insert(table, row)?;
    }

    debug!("* {} migrated ({} rows)", table, count);
    Ok(())
}

/// Orders tables parents-first along their reference edges (Kahn's
/// algorithm), name order breaking ties for determinism. References to
/// tables outside the set and self-references impose nothing.
pub(crate) fn dependency_order(
    shapes: &BTreeMap<String, Arc<TableSnapshot>>,
) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> =
        shapes.keys().map(|name| (name.as_str(), 0)).collect();
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, snapshot) in shapes {
        for parent in snapshot.referenced_tables() {
            if shapes.contains_key(parent) {
                if let Some(degree) = in_degree.get_mut(name.as_str()) {
                    *degree += 1;
                }
                children.entry(parent).or_default().push(name.as_str());
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(shapes.len());

    while let Some(&name) = ready.iter().next() {
        ready.remove(name);
        order.push(name.to_string());
        if let Some(kids) = children.get(name) {
            for &child in kids {
                if let Some(degree) = in_degree.get_mut(child) {
                    if *degree > 0 {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(child);
                        }
                    }
                }
            }
        }
    }

    if order.len() != shapes.len() {
        let stuck: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| *name)
            .collect();
        return Err(MigrateError::InvalidPlan(format!(
            "circular references between tables: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}
