//! Full-chain migration of a populated version-1 store to the current
//! version, checked step report, row contents and filesystem effects.

mod support;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use schemalift::core::Value;
use schemalift::store::{Store, StoreFile};
use schemalift::{catalog, MigrationReport, MigrationSettings, Migrator};

fn migrate(dir: &TempDir) -> (PathBuf, PathBuf, MigrationReport) {
    let (db, files) = support::seed_v1(dir.path());
    let settings = MigrationSettings::new(&db, &files);
    let report = Migrator::new(settings)
        .with_appdata(support::appdata())
        .run()
        .unwrap();
    (db, files, report)
}

fn load_current(db: &Path) -> Store {
    let shapes = catalog::registry()
        .tables_at(catalog::CURRENT_VERSION)
        .unwrap();
    StoreFile::new(db)
        .load(catalog::CURRENT_VERSION, shapes)
        .unwrap()
}

fn find(store: &Store, table: &str, column: &str, value: &str) -> schemalift::core::SourceRow {
    store
        .table(table)
        .unwrap()
        .find_by(column, &Value::Text(value.into()))
        .unwrap()
        .unwrap_or_else(|| panic!("no {} row with {} = {}", table, column, value))
}

#[test]
fn test_full_chain_report_and_counts() {
    let dir = TempDir::new().unwrap();
    let (db, files, report) = migrate(&dir);

    assert_eq!((report.from_version, report.to_version), (1, 6));
    assert_eq!(report.steps.len(), 5);
    assert_eq!(StoreFile::new(&db).peek_version().unwrap(), 6);

    let store = load_current(&db);
    let counts = store.counts();
    assert_eq!(counts["user"], 2);
    assert_eq!(counts["context"], 2);
    assert_eq!(counts["questionnaire"], 2);
    assert_eq!(counts["step"], 3);
    assert_eq!(counts["field"], 4);
    assert_eq!(counts["attachment"], 2);
    assert_eq!(counts["config"], 6);
    assert_eq!(counts["config_text"], 8);
    assert_eq!(counts["language"], 2);
    assert_eq!(counts["file"], 1);
    assert!(!store.has_table("node"));

    // the only waived count in the whole history is the field cleanup
    for step in &report.steps {
        for table in &step.tables {
            if step.to_version == 5 && table.table == "field" {
                assert!(table.waived);
                assert_eq!((table.expected, table.actual), (6, 4));
            } else {
                assert!(
                    !table.waived,
                    "unexpected waive on {} at step -> {}",
                    table.table, step.to_version
                );
                assert_eq!(table.expected, table.actual);
            }
        }
    }

    // a second run finds nothing to do
    let second = Migrator::new(MigrationSettings::new(&db, &files))
        .run()
        .unwrap();
    assert!(second.is_noop());
}

#[test]
fn test_profile_rework_carried_to_current() {
    let dir = TempDir::new().unwrap();
    let (db, _files, _report) = migrate(&dir);
    let store = load_current(&db);

    let alice = find(&store, "user", "username", "alice");

    let mut hasher = Sha256::new();
    hasher.update(b"alpha-salt");
    hasher.update(b"alice");
    let expected: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    assert_eq!(alice.get_str("salt").unwrap(), expected);
    assert_eq!(alice.get_str("public_name").unwrap(), "Alice");
    assert_eq!(alice.get_str("role").unwrap(), "receiver");
    assert!(!alice.has_column("timezone"));
}

#[test]
fn test_questionnaire_split() {
    let dir = TempDir::new().unwrap();
    let (db, _files, _report) = migrate(&dir);
    let store = load_current(&db);

    let ctx_a = find(&store, "context", "id", "ctx-a");
    let qid_a = ctx_a.get_str("questionnaire_id").unwrap().to_string();
    let promoted = find(&store, "questionnaire", "id", &qid_a);
    assert_eq!(promoted.get_str("name").unwrap(), "Default context");

    // steps follow their context's questionnaire
    let st_1 = find(&store, "step", "id", "st-1");
    assert_eq!(st_1.get_str("questionnaire_id").unwrap(), qid_a);

    let ctx_b = find(&store, "context", "id", "ctx-b");
    let qid_b = ctx_b.get_str("questionnaire_id").unwrap().to_string();
    assert_ne!(qid_a, qid_b);
    let st_3 = find(&store, "step", "id", "st-3");
    assert_eq!(st_3.get_str("questionnaire_id").unwrap(), qid_b);
}

#[test]
fn test_orphaned_fields_dropped() {
    let dir = TempDir::new().unwrap();
    let (db, _files, _report) = migrate(&dir);
    let store = load_current(&db);

    let fields = store.table("field").unwrap();
    assert_eq!(fields.row_count(), 4);
    assert!(fields
        .find_by("id", &Value::Text("f-zombie".into()))
        .unwrap()
        .is_none());
    assert!(fields
        .find_by("id", &Value::Text("f-broken".into()))
        .unwrap()
        .is_none());

    let sub = find(&store, "field", "id", "f-sub");
    assert_eq!(sub.get_str("parent_id").unwrap(), "f-details");
    let name = find(&store, "field", "id", "f-name");
    assert_eq!(name.get_str("step_id").unwrap(), "st-1");
    assert!(matches!(name.get("parent_id").unwrap(), Value::Null));
}

#[test]
fn test_attachments_relocated_on_disk() {
    let dir = TempDir::new().unwrap();
    let (db, files, _report) = migrate(&dir);
    let store = load_current(&db);

    let at_1 = find(&store, "attachment", "id", "at-1");
    assert_eq!(at_1.get_str("file_path").unwrap(), "attachments/at-1");
    assert_eq!(
        fs::read(files.join("attachments/at-1")).unwrap(),
        b"%PDF-1.4 evidence"
    );
    let at_2 = find(&store, "attachment", "id", "at-2");
    assert_eq!(at_2.get_str("file_path").unwrap(), "attachments/at-2");

    // the legacy layout is gone once the run commits
    assert!(!files.join("uploads").exists());
}

#[test]
fn test_node_exploded_into_config() {
    let dir = TempDir::new().unwrap();
    let (db, files, _report) = migrate(&dir);
    let store = load_current(&db);

    let name = find(&store, "config", "var_name", "name");
    assert_eq!(name.get_json("value").unwrap(), &json!("Disclosure Desk"));
    let size = find(&store, "config", "var_name", "maximum_filesize");
    assert_eq!(size.get_json("value").unwrap(), &json!(30));
    let hidden = find(&store, "config", "var_name", "hidden_service");
    assert_eq!(hidden.get_json("value").unwrap(), &serde_json::Value::Null);

    let language = store.table("language").unwrap();
    assert!(language
        .find_by("code", &Value::Text("en".into()))
        .unwrap()
        .is_some());
    assert!(language
        .find_by("code", &Value::Text("it".into()))
        .unwrap()
        .is_some());

    // stored text wins, defaults fill gaps, customized tracks the difference
    assert_eq!(text(&store, "header_title", "en"), ("Report a concern".to_string(), false));
    assert_eq!(
        text(&store, "header_title", "it"),
        ("Titolo personalizzato".to_string(), true)
    );
    assert_eq!(text(&store, "presentation", "en"), ("A safe channel".to_string(), false));
    assert_eq!(text(&store, "presentation", "it"), (String::new(), false));
    assert_eq!(
        text(&store, "footer", "en"),
        ("Powered by the platform".to_string(), false)
    );
    assert_eq!(
        text(&store, "whistleblowing_question", "en"),
        ("What happened?".to_string(), true)
    );

    // the logo became a blob row and its loose file is gone
    let logo = find(&store, "file", "id", "logo");
    assert_eq!(logo.get_str("name").unwrap(), "logo.png");
    match logo.get("data").unwrap() {
        Value::Blob(bytes) => assert_eq!(bytes.as_slice(), b"\x89PNG fake logo"),
        other => panic!("expected blob, got {:?}", other),
    }
    assert!(!files.join("logo.png").exists());
}

fn text(store: &Store, var: &str, lang: &str) -> (String, bool) {
    let table = store.table("config_text").unwrap();
    for row in table.rows() {
        if row.get_str("var_name").unwrap() == var && row.get_str("lang").unwrap() == lang {
            return (
                row.get_str("value").unwrap().to_string(),
                row.get_bool("customized").unwrap(),
            );
        }
    }
    panic!("no config_text row for {} / {}", var, lang);
}
