//! Version 4: questionnaires become their own table.
//!
//! Until now every context owned its steps directly. Version 4 promotes
//! each context's step tree to a `questionnaire` row, re-parents `step`
//! from `context_id` to `questionnaire_id`, and stamps the owning
//! questionnaire onto the context.
//!
//! Questionnaire ids are minted as name-based uuids derived from the
//! context id, so the context rule, the step rule and the epilogue all
//! agree on the id without reading each other's output.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::{DataType, Result, SourceRow, Value};
use crate::engine::{ColumnRule, StepContext, StepDescriptor};
use crate::schema::{ColumnDef, TableSnapshot};

const QUESTIONNAIRE_NAMESPACE: Uuid =
    Uuid::from_u128(0x8a6c_f95b_3e2d_4c41_9f2e_7d10_6b84_c305);

pub(crate) fn tables(
    prev: &BTreeMap<String, Arc<TableSnapshot>>,
) -> BTreeMap<String, Arc<TableSnapshot>> {
    let mut tables = prev.clone();

    tables.insert(
        "questionnaire".to_string(),
        Arc::new(TableSnapshot::new(
            4,
            "questionnaire",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
            ],
        )),
    );

    tables.insert(
        "context".to_string(),
        Arc::new(TableSnapshot::new(
            4,
            "context",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("description", DataType::Text),
                ColumnDef::new("questionnaire_id", DataType::Text)
                    .not_null()
                    .references("questionnaire"),
                ColumnDef::new("tip_timetolive", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(15)),
                ColumnDef::new("creation_date", DataType::DateTime).not_null(),
            ],
        )),
    );

    tables.insert(
        "step".to_string(),
        Arc::new(TableSnapshot::new(
            4,
            "step",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("questionnaire_id", DataType::Text)
                    .not_null()
                    .references("questionnaire"),
                ColumnDef::new("label", DataType::Text).not_null(),
                ColumnDef::new("description", DataType::Text),
                ColumnDef::new("presentation_order", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(0)),
            ],
        )),
    );

    tables
}

pub(crate) fn step(
    from: BTreeMap<String, Arc<TableSnapshot>>,
    to: BTreeMap<String, Arc<TableSnapshot>>,
) -> StepDescriptor {
    StepDescriptor::new(3, from, to)
        .with_rules(
            "context",
            vec![("questionnaire_id", ColumnRule::Compute(context_questionnaire))],
        )
        .with_rules(
            "step",
            vec![("questionnaire_id", ColumnRule::Compute(step_questionnaire))],
        )
        .with_epilogue(seed_questionnaires)
}

/// The questionnaire id a context's step tree is promoted under.
pub(crate) fn questionnaire_id_for(context_id: &str) -> Uuid {
    Uuid::new_v5(&QUESTIONNAIRE_NAMESPACE, context_id.as_bytes())
}

fn context_questionnaire(_ctx: &StepContext, row: &SourceRow) -> Result<Option<Value>> {
    let id = questionnaire_id_for(row.get_str("id")?);
    Ok(Some(Value::Text(id.to_string())))
}

fn step_questionnaire(_ctx: &StepContext, row: &SourceRow) -> Result<Option<Value>> {
    let id = questionnaire_id_for(row.get_str("context_id")?);
    Ok(Some(Value::Text(id.to_string())))
}

/// One questionnaire per old context, named after it.
fn seed_questionnaires(ctx: &mut StepContext) -> Result<()> {
    for context in ctx.old_rows("context")? {
        let id = questionnaire_id_for(context.get_str("id")?);
        let row = ctx
            .new_row("questionnaire")?
            .set("id", id.to_string())?
            .set("name", context.get("name")?.clone())?;
        ctx.insert("questionnaire", row)?;
    }
    Ok(())
}
