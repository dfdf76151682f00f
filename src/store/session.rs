use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::core::Result;
use crate::schema::TableSnapshot;
use crate::store::{Store, StoreFile};

/// The two stores one migration step works across: the old store, loaded
/// from disk and only ever read, and the new store, built in memory and
/// serialized on commit.
///
/// Loading validates the file against the old version's shapes before any
/// transform sees it; the new side starts empty, shaped by the target
/// version's snapshots.
pub struct DualStoreSession {
    old: Store,
    new: Store,
}

impl DualStoreSession {
    pub fn open(
        file: &StoreFile,
        from_version: u32,
        from_shapes: &BTreeMap<String, Arc<TableSnapshot>>,
        to_version: u32,
        to_shapes: &BTreeMap<String, Arc<TableSnapshot>>,
    ) -> Result<Self> {
        let old = file.load(from_version, from_shapes)?;
        let new = Store::empty(to_version, to_shapes);
        debug!(
            "Opened migration session {} -> {} ({} tables, {} rows in)",
            from_version,
            to_version,
            from_shapes.len(),
            old.total_rows()
        );
        Ok(Self { old, new })
    }

    pub fn old(&self) -> &Store {
        &self.old
    }

    pub fn new_store(&self) -> &Store {
        &self.new
    }

    /// Disjoint borrows for transform execution: read side and write side
    /// at the same time.
    pub fn split(&mut self) -> (&Store, &mut Store) {
        (&self.old, &mut self.new)
    }

    /// Consumes the session, keeping the written store for commit.
    pub fn into_new(self) -> Store {
        self.new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use crate::schema::ColumnDef;
    use tempfile::TempDir;

    fn shapes(version: u32, cols: Vec<ColumnDef>) -> BTreeMap<String, Arc<TableSnapshot>> {
        let mut map = BTreeMap::new();
        map.insert(
            "user".to_string(),
            Arc::new(TableSnapshot::new(version, "user", cols)),
        );
        map
    }

    #[test]
    fn test_open_session() {
        let temp_dir = TempDir::new().unwrap();
        let file = StoreFile::new(temp_dir.path().join("db.mdb"));

        let from = shapes(1, vec![ColumnDef::new("id", DataType::Text).not_null()]);
        let mut store = Store::empty(1, &from);
        store
            .table_mut("user")
            .unwrap()
            .insert(vec![Value::Text("u1".into())])
            .unwrap();
        file.save(&store).unwrap();

        let to = shapes(
            2,
            vec![
                ColumnDef::new("id", DataType::Text).not_null(),
                ColumnDef::new("name", DataType::Text),
            ],
        );
        let mut session = DualStoreSession::open(&file, 1, &from, 2, &to).unwrap();

        assert_eq!(session.old().table("user").unwrap().row_count(), 1);
        assert_eq!(session.new_store().version(), 2);
        assert_eq!(session.new_store().table("user").unwrap().row_count(), 0);

        let (old, new) = session.split();
        let row = old.table("user").unwrap().rows().next().unwrap();
        new.table_mut("user")
            .unwrap()
            .insert(vec![row.get("id").unwrap().clone(), Value::Null])
            .unwrap();
        assert_eq!(session.into_new().table("user").unwrap().row_count(), 1);
    }
}
