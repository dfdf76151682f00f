//! Count verification after a step: enforced equality by default, declared
//! waives recorded in the report, tables only present on one side exempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::TempDir;

use schemalift::appdata::AppData;
use schemalift::assets::AssetMigrator;
use schemalift::core::{DataType, MigrateError, Result, Value};
use schemalift::engine::{StepDescriptor, StepExecutor, StepReport};
use schemalift::schema::{ColumnDef, TableSnapshot};
use schemalift::store::{DualStoreSession, Store, StoreFile};

type Shapes = BTreeMap<String, Arc<TableSnapshot>>;

fn person_shapes(version: u32) -> Shapes {
    let mut map = BTreeMap::new();
    map.insert(
        "person".to_string(),
        Arc::new(TableSnapshot::new(
            version,
            "person",
            vec![ColumnDef::new("id", DataType::Text).not_null()],
        )),
    );
    map
}

fn two_people(shapes: &Shapes) -> Store {
    let mut store = Store::empty(1, shapes);
    let people = store.table_mut("person").unwrap();
    people.insert(vec![Value::Text("p1".into())]).unwrap();
    people.insert(vec![Value::Text("p2".into())]).unwrap();
    store
}

fn apply(old: &Store, from: &Shapes, to: &Shapes, step: &StepDescriptor) -> Result<StepReport> {
    let dir = TempDir::new().unwrap();
    let file = StoreFile::new(dir.path().join("store.db"));
    file.save(old).unwrap();
    let session = DualStoreSession::open(&file, 1, from, 2, to).unwrap();
    let mut assets = AssetMigrator::new(dir.path().join("files"));
    let appdata = AppData::empty();
    StepExecutor::apply(step, session, &mut assets, &appdata).map(|(_, report)| report)
}

fn keep_only(ctx: &mut schemalift::engine::StepContext, id: &str) -> Result<()> {
    for person in ctx.old_rows("person")? {
        if person.get_str("id")? != id {
            continue;
        }
        let row = ctx.new_row("person")?.copy_common(&person);
        ctx.insert("person", row)?;
    }
    Ok(())
}

#[test]
fn test_undeclared_shrink_fails() {
    let from = person_shapes(1);
    let to = person_shapes(2);
    let old = two_people(&from);

    let step = StepDescriptor::new(1, from.clone(), to.clone())
        .with_custom("person", |ctx| keep_only(ctx, "p1"));

    let err = apply(&old, &from, &to, &step).unwrap_err();
    match err {
        MigrateError::CountMismatch(table, expected, actual) => {
            assert_eq!(table, "person");
            assert_eq!((expected, actual), (2, 1));
        }
        other => panic!("expected CountMismatch, got {:?}", other),
    }
}

#[test]
fn test_undeclared_growth_fails() {
    let from = person_shapes(1);
    let to = person_shapes(2);
    let old = two_people(&from);

    let step = StepDescriptor::new(1, from.clone(), to.clone()).with_custom("person", |ctx| {
        for person in ctx.old_rows("person")? {
            let row = ctx.new_row("person")?.copy_common(&person);
            ctx.insert("person", row)?;
        }
        let extra = ctx.new_row("person")?.set("id", "p3")?;
        ctx.insert("person", extra)
    });

    let err = apply(&old, &from, &to, &step).unwrap_err();
    assert!(matches!(err, MigrateError::CountMismatch(_, 2, 3)));
}

#[test]
fn test_declared_waive_passes_and_is_reported() {
    let from = person_shapes(1);
    let to = person_shapes(2);
    let old = two_people(&from);

    let step = StepDescriptor::new(1, from.clone(), to.clone())
        .with_custom("person", |ctx| keep_only(ctx, "p1"))
        .waive_count("person", "defective rows are dropped");

    let report = apply(&old, &from, &to, &step).unwrap();
    let counted = &report.tables[0];
    assert_eq!(counted.table, "person");
    assert_eq!((counted.expected, counted.actual), (2, 1));
    assert!(counted.waived);
}

#[test]
fn test_waive_without_change_still_reported() {
    // a declared waive that turns out unnecessary is not an error
    let from = person_shapes(1);
    let to = person_shapes(2);
    let old = two_people(&from);

    let step = StepDescriptor::new(1, from.clone(), to.clone())
        .waive_count("person", "cleanup that may drop rows");

    let report = apply(&old, &from, &to, &step).unwrap();
    let counted = &report.tables[0];
    assert_eq!((counted.expected, counted.actual), (2, 2));
    assert!(counted.waived);
}

#[test]
fn test_retired_table_not_verified() {
    let mut from = person_shapes(1);
    from.insert(
        "legacy".to_string(),
        Arc::new(TableSnapshot::new(
            1,
            "legacy",
            vec![ColumnDef::new("id", DataType::Text).not_null()],
        )),
    );
    let to = person_shapes(2);

    let mut old = Store::empty(1, &from);
    old.table_mut("person")
        .unwrap()
        .insert(vec![Value::Text("p1".into())])
        .unwrap();
    old.table_mut("legacy")
        .unwrap()
        .insert(vec![Value::Text("l1".into())])
        .unwrap();

    let step = StepDescriptor::new(1, from.clone(), to.clone());
    let report = apply(&old, &from, &to, &step).unwrap();

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].table, "person");
}
