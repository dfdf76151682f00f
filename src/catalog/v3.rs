//! Version 3: the `step_field` / `field_field` join tables are flattened
//! into nullable `field.step_id` / `field.parent_id` columns and retired.
//!
//! A field links to at most one step and at most one parent, so the join
//! tables never carried more than one row per field; the computes below
//! look the link up in the old store and leave Null when there is none.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{DataType, Result, SourceRow, Value};
use crate::engine::{ColumnRule, StepContext, StepDescriptor};
use crate::schema::{ColumnDef, TableSnapshot};

pub(crate) fn tables(
    prev: &BTreeMap<String, Arc<TableSnapshot>>,
) -> BTreeMap<String, Arc<TableSnapshot>> {
    let mut tables = prev.clone();
    tables.remove("step_field");
    tables.remove("field_field");

    tables.insert(
        "field".to_string(),
        Arc::new(TableSnapshot::new(
            3,
            "field",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("label", DataType::Text).not_null(),
                ColumnDef::new("description", DataType::Text),
                ColumnDef::new("field_type", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("inputbox".into())),
                ColumnDef::new("required", DataType::Boolean)
                    .not_null()
                    .with_default(Value::Boolean(false)),
                ColumnDef::new("presentation_order", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(0)),
                ColumnDef::new("step_id", DataType::Text).references("step"),
                ColumnDef::new("parent_id", DataType::Text).references("field"),
            ],
        )),
    );

    tables
}

pub(crate) fn step(
    from: BTreeMap<String, Arc<TableSnapshot>>,
    to: BTreeMap<String, Arc<TableSnapshot>>,
) -> StepDescriptor {
    StepDescriptor::new(2, from, to).with_rules(
        "field",
        vec![
            ("step_id", ColumnRule::Compute(resolve_step_id)),
            ("parent_id", ColumnRule::Compute(resolve_parent_id)),
        ],
    )
}

fn resolve_step_id(ctx: &StepContext, row: &SourceRow) -> Result<Option<Value>> {
    let id = row.get("id")?;
    match ctx.old().table("step_field")?.find_by("field_id", id)? {
        Some(link) => Ok(Some(link.get("step_id")?.clone())),
        None => Ok(None),
    }
}

fn resolve_parent_id(ctx: &StepContext, row: &SourceRow) -> Result<Option<Value>> {
    let id = row.get("id")?;
    match ctx.old().table("field_field")?.find_by("child_id", id)? {
        Some(link) => Ok(Some(link.get("parent_id")?.clone())),
        None => Ok(None),
    }
}
