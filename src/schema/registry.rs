use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{MigrateError, Result};
use crate::schema::TableSnapshot;

/// All table shapes the engine knows, keyed by schema version.
///
/// Each version holds the complete set of tables that existed at it. A table
/// whose shape did not change between versions shares one `Arc`d snapshot
/// across them (the snapshot's own `version` field records where the shape
/// was frozen, not where it is referenced from). Introduction and retirement
/// are expressed by presence: a table absent from version N's set simply did
/// not exist at N.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    versions: BTreeMap<u32, BTreeMap<String, Arc<TableSnapshot>>>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_version(
        &mut self,
        version: u32,
        tables: BTreeMap<String, Arc<TableSnapshot>>,
    ) -> Result<()> {
        if self.versions.contains_key(&version) {
            return Err(MigrateError::SchemaMismatch(format!(
                "version {} registered twice",
                version
            )));
        }
        self.versions.insert(version, tables);
        Ok(())
    }

    pub fn snapshot_for(&self, table: &str, version: u32) -> Option<Arc<TableSnapshot>> {
        self.versions.get(&version)?.get(table).cloned()
    }

    pub fn tables_at(&self, version: u32) -> Option<&BTreeMap<String, Arc<TableSnapshot>>> {
        self.versions.get(&version)
    }

    pub fn contains_version(&self, version: u32) -> bool {
        self.versions.contains_key(&version)
    }

    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.versions.keys().copied()
    }

    pub fn oldest_version(&self) -> Option<u32> {
        self.versions.keys().next().copied()
    }

    pub fn newest_version(&self) -> Option<u32> {
        self.versions.keys().next_back().copied()
    }
}
