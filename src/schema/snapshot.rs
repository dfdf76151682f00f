use serde::{Deserialize, Serialize};

use crate::core::{DataType, MigrateError, Result, Value};

/// One column of a table as it looked at a specific schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: Option<Value>,
    /// Table this column points at. Drives dependency-ordered execution;
    /// a column referencing its own table is a tree link and imposes no order.
    pub references: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if matches!(value, Value::Null) {
            if !self.nullable {
                return Err(MigrateError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(MigrateError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }

    /// Shape equality as far as stored rows are concerned. Defaults and
    /// reference metadata do not change what a cell on disk looks like.
    pub fn same_shape(&self, other: &ColumnDef) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && self.nullable == other.nullable
    }
}

/// The frozen shape of one table at one schema version.
///
/// Snapshots are built once when the version catalog is assembled and are
/// never modified afterwards; live code sharing them holds an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub version: u32,
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSnapshot {
    pub fn new(version: u32, name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            version,
            name: name.into(),
            columns,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Names of tables this table's rows point at, self-links excluded.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter_map(|col| col.references.as_deref())
            .filter(|parent| *parent != self.name)
    }

    pub fn same_shape(&self, other: &TableSnapshot) -> bool {
        self.name == other.name
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.same_shape(b))
    }
}
