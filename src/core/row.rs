use std::sync::Arc;

use crate::core::{MigrateError, Result, Value};
use crate::schema::TableSnapshot;

/// Positional row storage; cell order follows the owning snapshot's columns.
pub type Row = Vec<Value>;

/// An owned view of one row read from the old store.
///
/// Carries the snapshot the row was shaped by, so columns are addressed by
/// name even though storage is positional. Owning the cells keeps transform
/// closures free to insert into the new store while iterating old rows.
#[derive(Debug, Clone)]
pub struct SourceRow {
    snapshot: Arc<TableSnapshot>,
    cells: Row,
}

impl SourceRow {
    pub fn new(snapshot: Arc<TableSnapshot>, cells: Row) -> Self {
        Self { snapshot, cells }
    }

    pub fn table_name(&self) -> &str {
        &self.snapshot.name
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.snapshot.column_index(column).is_some()
    }

    pub fn get(&self, column: &str) -> Result<&Value> {
        let idx = self.snapshot.column_index(column).ok_or_else(|| {
            MigrateError::ColumnNotFound(column.to_string(), self.snapshot.name.clone())
        })?;
        Ok(&self.cells[idx])
    }

    pub fn get_str(&self, column: &str) -> Result<&str> {
        self.get(column)?.as_str().ok_or_else(|| {
            MigrateError::TypeMismatch(format!(
                "column '{}' in '{}' is not TEXT",
                column, self.snapshot.name
            ))
        })
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get(column)?.as_i64().ok_or_else(|| {
            MigrateError::TypeMismatch(format!(
                "column '{}' in '{}' is not numeric",
                column, self.snapshot.name
            ))
        })
    }

    pub fn get_bool(&self, column: &str) -> Result<bool> {
        Ok(self.get(column)?.as_bool())
    }

    pub fn get_json(&self, column: &str) -> Result<&serde_json::Value> {
        self.get(column)?.as_json().ok_or_else(|| {
            MigrateError::TypeMismatch(format!(
                "column '{}' in '{}' is not JSON",
                column, self.snapshot.name
            ))
        })
    }

    pub fn into_cells(self) -> Row {
        self.cells
    }
}

/// Builds a row shaped by a target snapshot.
///
/// Cells start from the declared column defaults (NULL where none is
/// declared); `set` addresses columns by name. Validation against types and
/// nullability happens when the finished row is inserted into its table.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    snapshot: Arc<TableSnapshot>,
    cells: Row,
}

impl RowBuilder {
    pub fn new(snapshot: Arc<TableSnapshot>) -> Self {
        let cells = snapshot
            .columns
            .iter()
            .map(|c| c.default.clone().unwrap_or(Value::Null))
            .collect();
        Self { snapshot, cells }
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Result<Self> {
        let idx = self.snapshot.column_index(column).ok_or_else(|| {
            MigrateError::ColumnNotFound(column.to_string(), self.snapshot.name.clone())
        })?;
        self.cells[idx] = value.into();
        Ok(self)
    }

    /// Puts a column back to its declared default (NULL where none is
    /// declared), discarding anything previously set or copied into it.
    pub fn reset(mut self, column: &str) -> Result<Self> {
        let idx = self.snapshot.column_index(column).ok_or_else(|| {
            MigrateError::ColumnNotFound(column.to_string(), self.snapshot.name.clone())
        })?;
        self.cells[idx] = self.snapshot.columns[idx]
            .default
            .clone()
            .unwrap_or(Value::Null);
        Ok(self)
    }

    /// Copies every column the source row shares with the target shape.
    /// Columns the source does not have keep their defaults.
    pub fn copy_common(mut self, source: &SourceRow) -> Self {
        for (idx, col) in self.snapshot.columns.iter().enumerate() {
            if let Ok(value) = source.get(&col.name) {
                self.cells[idx] = value.clone();
            }
        }
        self
    }

    pub fn build(self) -> Row {
        self.cells
    }
}
