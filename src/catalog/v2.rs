//! Version 2: profile rework on `user`.
//!
//! The unused `timezone` column goes away, a `public_name` shown on public
//! pages arrives (seeded from the private name), and salts are re-derived
//! because the hashing scheme changed between releases.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::core::{DataType, Result, SourceRow, Value};
use crate::engine::{ColumnRule, StepContext, StepDescriptor};
use crate::schema::{ColumnDef, TableSnapshot};

pub(crate) fn tables(
    prev: &BTreeMap<String, Arc<TableSnapshot>>,
) -> BTreeMap<String, Arc<TableSnapshot>> {
    let mut tables = prev.clone();

    tables.insert(
        "user".to_string(),
        Arc::new(TableSnapshot::new(
            2,
            "user",
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("username", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text).not_null(),
                ColumnDef::new("public_name", DataType::Text).not_null(),
                ColumnDef::new("salt", DataType::Text).not_null(),
                ColumnDef::new("password", DataType::Text).not_null(),
                ColumnDef::new("role", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("receiver".into())),
                ColumnDef::new("language", DataType::Text)
                    .not_null()
                    .with_default(Value::Text("en".into())),
                ColumnDef::new("creation_date", DataType::DateTime).not_null(),
            ],
        )),
    );

    tables
}

pub(crate) fn step(
    from: BTreeMap<String, Arc<TableSnapshot>>,
    to: BTreeMap<String, Arc<TableSnapshot>>,
) -> StepDescriptor {
    StepDescriptor::new(1, from, to).with_rules(
        "user",
        vec![
            ("salt", ColumnRule::Compute(rehash_salt)),
            ("public_name", ColumnRule::Compute(seed_public_name)),
        ],
    )
}

/// Old salts were raw random strings; from version 2 on they are the hex
/// SHA-256 of the old salt concatenated with the username, so existing
/// passwords keep verifying under the new scheme.
fn rehash_salt(_ctx: &StepContext, row: &SourceRow) -> Result<Option<Value>> {
    let mut hasher = Sha256::new();
    hasher.update(row.get_str("salt")?.as_bytes());
    hasher.update(row.get_str("username")?.as_bytes());
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    Ok(Some(Value::Text(hex)))
}

fn seed_public_name(_ctx: &StepContext, row: &SourceRow) -> Result<Option<Value>> {
    Ok(Some(row.get("name")?.clone()))
}
