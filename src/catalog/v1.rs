//! Baseline schema: the oldest store layout still supported.
//!
//! Questionnaire structure lives in `step`/`field` join tables, node-wide
//! settings and localized texts sit in the single-row `node` table, and
//! uploaded files are tracked by `attachment` rows pointing under
//! `uploads/`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{DataType, Value};
use crate::schema::{ColumnDef, TableSnapshot};

pub(crate) fn tables() -> BTreeMap<String, Arc<TableSnapshot>> {
    let mut tables = BTreeMap::new();

    tables.insert(
        "user".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "user",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("username", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("salt", DataType::Text).not_null(),
                ColumnDef::new("password", DataType::Text).not_null(),
                ColumnDef::new("role", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("receiver".into())),
                ColumnDef::new("language", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("en".into())),
                ColumnDef::new("timezone", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(0)),
                ColumnDef::new("creation_date", DataType::DateTime).not_null(),
            ],
        )),
    );

    tables.insert(
        "context".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "context",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("description", DataType::Text),
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
            1,
            "step",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("context_id", DataType::Text)
                    .not_null()
                    .references("context"),
                ColumnDef::new("label", DataType::Text).not_null(),
                ColumnDef::new("description", DataType::Text),
                ColumnDef::new("presentation_order", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(0)),
            ],
        )),
    );

    tables.insert(
        "field".to_string(),
        Arc::new(TableSnapshot::new(
            1,
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
            ],
        )),
    );

    // association tables, flattened away in version 3
    tables.insert(
        "step_field".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "step_field",
            vec![
                ColumnDef::new("step_id", DataType::Text)
                    .not_null()
                    .references("step"),
                ColumnDef::new("field_id", DataType::Text)
                    .not_null()
                    .references("field"),
            ],
        )),
    );
    tables.insert(
        "field_field".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "field_field",
            vec![
                ColumnDef::new("parent_id", DataType::Text)
                    .not_null()
                    .references("field"),
                ColumnDef::new("child_id", DataType::Text)
                    .not_null()
                    .references("field"),
            ],
        )),
    );

    tables.insert(
        "attachment".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "attachment",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("tip_id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("file_path", DataType::Text).not_null(),
                ColumnDef::new("content_type", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("application/octet-stream".into())),
                ColumnDef::new("size", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(0)),
                ColumnDef::new("creation_date", DataType::DateTime).not_null(),
            ],
        )),
    );

    tables.insert(
        "node".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "node",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("public_site", DataType::Text),
                ColumnDef::new("hidden_service", DataType::Text),
                ColumnDef::new("languages_enabled", DataType::Json).not_null(),
                ColumnDef::new("default_language", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("en".into())),
                ColumnDef::new("maximum_filesize", DataType::Integer)
                    .not_null()
                    .with_default(Value::Integer(30)),
                ColumnDef::new("allow_unencrypted", DataType::Boolean)
                    .not_null()
                    .with_default(Value::Boolean(false)),
                // localized texts, one JSON object of language -> string each
                ColumnDef::new("header_title", DataType::Json),
                ColumnDef::new("presentation", DataType::Json),
                ColumnDef::new("footer", DataType::Json),
                ColumnDef::new("whistleblowing_question", DataType::Json),
            ],
        )),
    );

    tables
}
