//! Version 5: same shapes as version 4, different contents.
//!
//! Two defects left by earlier releases are repaired here. Deleting a step
//! used to leave its fields behind, so `field` carries rows that nothing
//! references anymore; those are dropped under a declared waive. And
//! attachments still sit in the legacy `uploads/<tip>/...` layout, so every
//! `attachment` row has its file moved under `attachments/` and its
//! `file_path` rewritten to match.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{info, warn};

use crate::core::{Result, Value};
use crate::engine::{StepContext, StepDescriptor};
use crate::schema::TableSnapshot;

pub(crate) fn tables(
    prev: &BTreeMap<String, Arc<TableSnapshot>>,
) -> BTreeMap<String, Arc<TableSnapshot>> {
    prev.clone()
}

pub(crate) fn step(
    from: BTreeMap<String, Arc<TableSnapshot>>,
    to: BTreeMap<String, Arc<TableSnapshot>>,
) -> StepDescriptor {
    StepDescriptor::new(4, from, to)
        .with_prologue(make_attachment_root)
        .with_custom("field", prune_orphan_fields)
        .with_custom("attachment", relocate_attachments)
        .with_epilogue(retire_upload_layout)
        .waive_count("field", "rows orphaned by earlier releases are dropped")
}

fn make_attachment_root(ctx: &mut StepContext) -> Result<()> {
    ctx.assets().ensure_dir("attachments")
}

/// A field is orphaned when it floats free (no step, no parent) or when its
/// parent id points at a field that no longer exists. Everything else is
/// copied through unchanged.
fn prune_orphan_fields(ctx: &mut StepContext) -> Result<()> {
    let known: BTreeSet<String> = ctx
        .old_rows("field")?
        .iter()
        .map(|row| Ok(row.get_str("id")?.to_string()))
        .collect::<Result<_>>()?;

    let mut dropped = 0usize;
    for field in ctx.old_rows("field")? {
        let orphaned = match field.get("parent_id")? {
            Value::Null => matches!(field.get("step_id")?, Value::Null),
            Value::Text(parent) => !known.contains(parent),
            _ => false,
        };
        if orphaned {
            warn!("* field {} is orphaned, dropping it", field.get_str("id")?);
            dropped += 1;
            continue;
        }
        let row = ctx.new_row("field")?.copy_common(&field);
        ctx.insert("field", row)?;
    }

    if dropped > 0 {
        info!("* field cleanup dropped {} orphaned rows", dropped);
    }
    Ok(())
}

/// The emptied legacy tree goes away once the whole run commits; until
/// then a failure can still roll the moves back into it.
fn retire_upload_layout(ctx: &mut StepContext) -> Result<()> {
    ctx.assets().remove_dir("uploads");
    Ok(())
}

fn relocate_attachments(ctx: &mut StepContext) -> Result<()> {
    for attachment in ctx.old_rows("attachment")? {
        let id = attachment.get_str("id")?.to_string();
        let old_path = attachment.get_str("file_path")?.to_string();
        let new_path = format!("attachments/{}", id);
        ctx.assets().move_asset(&old_path, &new_path)?;

        let row = ctx
            .new_row("attachment")?
            .copy_common(&attachment)
            .set("file_path", new_path)?;
        ctx.insert("attachment", row)?;
    }
    Ok(())
}
