//! Version 6: the single-row `node` table is retired.
//!
//! Its scalar settings become `config` key/value rows, its localized texts
//! become per-language `config_text` rows seeded against the appdata
//! defaults, its enabled languages become `language` rows, and a loose
//! `logo.png` under the asset root is inlined into a `file` blob row.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{DataType, MigrateError, Result, Value};
use crate::engine::{StepContext, StepDescriptor};
use crate::schema::{ColumnDef, TableSnapshot};

/// Scalar node settings that become `config` rows.
const CONFIG_VARS: [&str; 6] = [
    "name",
    "public_site",
    "hidden_service",
    "default_language",
    "maximum_filesize",
    "allow_unencrypted",
];

/// Localized node texts that become `config_text` rows.
const TEXT_VARS: [&str; 4] = [
    "header_title",
    "presentation",
    "footer",
    "whistleblowing_question",
];

pub(crate) fn tables(
    prev: &BTreeMap<String, Arc<TableSnapshot>>,
) -> BTreeMap<String, Arc<TableSnapshot>> {
    let mut tables = prev.clone();
    tables.remove("node");

    tables.insert(
        "config".to_string(),
        Arc::new(TableSnapshot::new(
            6,
            "config",
            vec![
                ColumnDef::new("var_name", DataType::Text).not_null(),
                ColumnDef::new("value", DataType::Json).not_null(),
            ],
        )),
    );
    tables.insert(
        "config_text".to_string(),
        Arc::new(TableSnapshot::new(
            6,
            "config_text",
            vec![
                ColumnDef::new("lang", DataType::Text).not_null(),
                ColumnDef::new("var_name", DataType::Text).not_null(),
                ColumnDef::new("value", DataType::Text).not_null(),
                ColumnDef::new("customized", DataType::Boolean)
                    .not_null()
                    .with_default(Value::Boolean(false)),
            ],
        )),
    );
    tables.insert(
        "language".to_string(),
        Arc::new(TableSnapshot::new(
            6,
            "language",
            vec![ColumnDef::new("code", DataType::Text).not_null()],
        )),
    );
    tables.insert(
        "file".to_string(),
        Arc::new(TableSnapshot::new(
            6,
            "file",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("data", DataType::Blob).not_null(),
            ],
        )),
    );

    tables
}

pub(crate) fn step(
    from: BTreeMap<String, Arc<TableSnapshot>>,
    to: BTreeMap<String, Arc<TableSnapshot>>,
) -> StepDescriptor {
    StepDescriptor::new(5, from, to).with_epilogue(extract_node_config)
}

fn extract_node_config(ctx: &mut StepContext) -> Result<()> {
    let nodes = ctx.old_rows("node")?;
    let node = match nodes.as_slice() {
        [row] => row,
        _ => {
            return Err(MigrateError::Transform(
                "node".to_string(),
                format!("expected exactly one node row, found {}", nodes.len()),
            ));
        }
    };

    for var in CONFIG_VARS {
        let value = value_to_json(node.get(var)?);
        let row = ctx
            .new_row("config")?
            .set("var_name", var)?
            .set("value", value)?;
        ctx.insert("config", row)?;
    }

    let default_language = node.get_str("default_language")?.to_string();
    let mut languages: Vec<String> = match node.get("languages_enabled")? {
        Value::Json(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    if languages.is_empty() {
        languages.push(default_language);
    }
    for code in &languages {
        let row = ctx.new_row("language")?.set("code", code.as_str())?;
        ctx.insert("language", row)?;
    }

    // A stored text wins over the appdata default; `customized` records
    // whether it actually differs from that default.
    for var in TEXT_VARS {
        let stored = match node.get(var)? {
            Value::Json(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        };
        for lang in &languages {
            let stored_text = stored
                .and_then(|map| map.get(lang.as_str()))
                .and_then(|text| text.as_str())
                .unwrap_or("");
            let default_text = ctx
                .appdata()
                .default_text("node", var, lang)
                .unwrap_or("")
                .to_string();
            let (value, customized) = if stored_text.is_empty() {
                (default_text, false)
            } else {
                let customized = stored_text != default_text;
                (stored_text.to_string(), customized)
            };
            let row = ctx
                .new_row("config_text")?
                .set("lang", lang.as_str())?
                .set("var_name", var)?
                .set("value", value)?
                .set("customized", customized)?;
            ctx.insert("config_text", row)?;
        }
    }

    if ctx.assets().exists("logo.png") {
        let data = ctx.assets().encode_into_row("logo.png")?;
        let row = ctx
            .new_row("file")?
            .set("id", "logo")?
            .set("name", "logo.png")?
            .set("data", data)?;
        ctx.insert("file", row)?;
        ctx.assets().remove("logo.png");
    }

    Ok(())
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
        Value::Json(json) => json.clone(),
        // blobs have no config representation
        Value::Blob(_) => serde_json::Value::Null,
    }
}
