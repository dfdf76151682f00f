use std::sync::Arc;

use crate::core::{MigrateError, Result, Row, SourceRow, Value};
use crate::schema::TableSnapshot;

/// Rows of one table, bound to the snapshot that shapes them.
///
/// Every insert is validated against the snapshot: cell count, nullability
/// and type compatibility. There is no update or delete; migration writes
/// each table once, front to back.
#[derive(Debug, Clone)]
pub struct Table {
    snapshot: Arc<TableSnapshot>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(snapshot: Arc<TableSnapshot>) -> Self {
        Self {
            snapshot,
            rows: Vec::new(),
        }
    }

    /// Rebuilds a table from decoded rows, validating each one. Used when
    /// loading a store file; a row a snapshot rejects means the file does
    /// not actually hold the shape its header claims.
    pub fn from_rows(snapshot: Arc<TableSnapshot>, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::new(snapshot);
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    pub fn snapshot(&self) -> &Arc<TableSnapshot> {
        &self.snapshot
    }

    pub fn name(&self) -> &str {
        &self.snapshot.name
    }

    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.validate_row(&row)?;
        self.rows.push(row);
        Ok(())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = &self.snapshot.columns;
        if row.len() != columns.len() {
            return Err(MigrateError::SchemaMismatch(format!(
                "table '{}' expects {} columns, got {}",
                self.snapshot.name,
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value).map_err(|e| match e {
                MigrateError::TypeMismatch(msg) => MigrateError::TypeMismatch(format!(
                    "table '{}': {}",
                    self.snapshot.name, msg
                )),
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Owned per-row views; safe to hold while mutating other tables.
    pub fn rows(&self) -> impl Iterator<Item = SourceRow> + '_ {
        self.rows
            .iter()
            .map(|row| SourceRow::new(self.snapshot.clone(), row.clone()))
    }

    /// First row whose cell in `column` equals `value`.
    pub fn find_by(&self, column: &str, value: &Value) -> Result<Option<SourceRow>> {
        let idx = self.snapshot.column_index(column).ok_or_else(|| {
            MigrateError::ColumnNotFound(column.to_string(), self.snapshot.name.clone())
        })?;
        Ok(self
            .rows
            .iter()
            .find(|row| &row[idx] == value)
            .map(|row| SourceRow::new(self.snapshot.clone(), row.clone())))
    }

    pub fn raw_rows(&self) -> &[Row] {
        &self.rows
    }
}
