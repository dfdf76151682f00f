#![allow(dead_code)]

//! Shared fixtures: a populated version-1 store with its asset files, and
//! the appdata bundle the config extraction step seeds texts from.

use chrono::{TimeZone, Utc};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use schemalift::core::{RowBuilder, Value};
use schemalift::store::{Store, StoreFile};
use schemalift::{catalog, AppData};

pub const APPDATA: &str = r#"{
    "version": 6,
    "texts": {
        "node": {
            "header_title": {"en": "Report a concern", "it": "Segnala un problema"},
            "presentation": {"en": "A safe channel"},
            "footer": {"en": "Powered by the platform"}
        }
    }
}"#;

pub fn appdata() -> AppData {
    AppData::from_json_str(APPDATA).unwrap()
}

pub fn creation_date() -> Value {
    Value::DateTime(Utc.with_ymd_and_hms(2019, 4, 2, 12, 0, 0).unwrap())
}

fn builder(store: &Store, table: &str) -> RowBuilder {
    RowBuilder::new(store.table(table).unwrap().snapshot().clone())
}

fn insert(store: &mut Store, table: &str, row: RowBuilder) {
    store.table_mut(table).unwrap().insert(row.build()).unwrap();
}

pub fn add_user(store: &mut Store, id: &str, username: &str, name: &str, salt: &str) {
    let row = builder(store, "user")
        .set("id", id)
        .unwrap()
        .set("username", username)
        .unwrap()
        .set("name", name)
        .unwrap()
        .set("salt", salt)
        .unwrap()
        .set("password", "stored-password-hash")
        .unwrap()
        .set("creation_date", creation_date())
        .unwrap();
    insert(store, "user", row);
}

pub fn add_context(store: &mut Store, id: &str, name: &str) {
    let row = builder(store, "context")
        .set("id", id)
        .unwrap()
        .set("name", name)
        .unwrap()
        .set("creation_date", creation_date())
        .unwrap();
    insert(store, "context", row);
}

pub fn add_step(store: &mut Store, id: &str, context_id: &str, label: &str) {
    let row = builder(store, "step")
        .set("id", id)
        .unwrap()
        .set("context_id", context_id)
        .unwrap()
        .set("label", label)
        .unwrap();
    insert(store, "step", row);
}

pub fn add_field(store: &mut Store, id: &str, label: &str) {
    let row = builder(store, "field")
        .set("id", id)
        .unwrap()
        .set("label", label)
        .unwrap();
    insert(store, "field", row);
}

pub fn link_step_field(store: &mut Store, step_id: &str, field_id: &str) {
    let row = builder(store, "step_field")
        .set("step_id", step_id)
        .unwrap()
        .set("field_id", field_id)
        .unwrap();
    insert(store, "step_field", row);
}

pub fn link_field_field(store: &mut Store, parent_id: &str, child_id: &str) {
    let row = builder(store, "field_field")
        .set("parent_id", parent_id)
        .unwrap()
        .set("child_id", child_id)
        .unwrap();
    insert(store, "field_field", row);
}

pub fn add_attachment(
    store: &mut Store,
    files_root: &Path,
    id: &str,
    tip_id: &str,
    name: &str,
    bytes: &[u8],
) {
    let relative = format!("uploads/{}/{}", tip_id, id);
    let on_disk = files_root.join(&relative);
    fs::create_dir_all(on_disk.parent().unwrap()).unwrap();
    fs::write(&on_disk, bytes).unwrap();

    let row = builder(store, "attachment")
        .set("id", id)
        .unwrap()
        .set("tip_id", tip_id)
        .unwrap()
        .set("name", name)
        .unwrap()
        .set("file_path", relative)
        .unwrap()
        .set("size", bytes.len() as i64)
        .unwrap()
        .set("creation_date", creation_date())
        .unwrap();
    insert(store, "attachment", row);
}

pub fn add_node(store: &mut Store) {
    let row = builder(store, "node")
        .set("id", "node-1")
        .unwrap()
        .set("name", "Disclosure Desk")
        .unwrap()
        .set("public_site", "https://example.org")
        .unwrap()
        .set("languages_enabled", json!(["en", "it"]))
        .unwrap()
        .set(
            "header_title",
            json!({"en": "Report a concern", "it": "Titolo personalizzato"}),
        )
        .unwrap()
        .set("footer", json!({}))
        .unwrap()
        .set("whistleblowing_question", json!({"en": "What happened?"}))
        .unwrap();
    insert(store, "node", row);
}

/// Writes a fully populated version-1 store plus its asset files under
/// `root` and returns the store path and the asset root.
///
/// The population exercises every later step: two users whose salts get
/// re-derived, two contexts that become questionnaires, three steps, six
/// fields of which two are orphans dropped by the version 5 cleanup, two
/// attachments sitting in the legacy `uploads/` layout, one node row and
/// a loose `logo.png` consumed by the config extraction.
pub fn seed_v1(root: &Path) -> (PathBuf, PathBuf) {
    let db = root.join("store.db");
    let files = root.join("files");
    fs::create_dir_all(&files).unwrap();

    let shapes = catalog::registry().tables_at(1).unwrap();
    let mut store = Store::empty(1, shapes);

    add_user(&mut store, "u-alice", "alice", "Alice", "alpha-salt");
    add_user(&mut store, "u-bob", "bob", "Bob", "beta-salt");

    add_context(&mut store, "ctx-a", "Default context");
    add_context(&mut store, "ctx-b", "Second context");

    add_step(&mut store, "st-1", "ctx-a", "Identity");
    add_step(&mut store, "st-2", "ctx-a", "Details");
    add_step(&mut store, "st-3", "ctx-b", "Anything else");

    add_field(&mut store, "f-name", "Your name");
    add_field(&mut store, "f-email", "Contact address");
    add_field(&mut store, "f-details", "What happened");
    add_field(&mut store, "f-sub", "When exactly");
    add_field(&mut store, "f-zombie", "Left behind by a deleted step");
    add_field(&mut store, "f-broken", "Parent no longer exists");

    link_step_field(&mut store, "st-1", "f-name");
    link_step_field(&mut store, "st-1", "f-email");
    link_step_field(&mut store, "st-2", "f-details");
    link_field_field(&mut store, "f-details", "f-sub");
    link_field_field(&mut store, "f-gone", "f-broken");

    add_attachment(
        &mut store,
        &files,
        "at-1",
        "tip-1",
        "evidence.pdf",
        b"%PDF-1.4 evidence",
    );
    add_attachment(
        &mut store,
        &files,
        "at-2",
        "tip-2",
        "photo.jpg",
        b"\xff\xd8\xff jpeg bytes",
    );

    add_node(&mut store);
    fs::write(files.join("logo.png"), b"\x89PNG fake logo").unwrap();

    StoreFile::new(&db).save(&store).unwrap();
    (db, files)
}
