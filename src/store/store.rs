use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{MigrateError, Result};
use crate::schema::TableSnapshot;
use crate::store::Table;

/// All tables of one database at one schema version.
#[derive(Debug, Clone)]
pub struct Store {
    version: u32,
    tables: BTreeMap<String, Table>,
}

impl Store {
    /// An empty store shaped by the given snapshot set.
    pub fn empty(version: u32, shapes: &BTreeMap<String, Arc<TableSnapshot>>) -> Self {
        let tables = shapes
            .iter()
            .map(|(name, snap)| (name.clone(), Table::new(snap.clone())))
            .collect();
        Self { version, tables }
    }

    pub fn from_tables(version: u32, tables: BTreeMap<String, Table>) -> Self {
        Self { version, tables }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| MigrateError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| MigrateError::TableNotFound(name.to_string()))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|s| s.as_str())
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Per-table row counts, the unit the integrity verifier reconciles.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|(name, table)| (name.clone(), table.row_count()))
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(|t| t.row_count()).sum()
    }
}
