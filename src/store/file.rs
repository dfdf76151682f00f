//! Store file codec: a framed header followed by the table data, written
//! atomically via a temp file and rename.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::{MigrateError, Result, Row};
use crate::schema::{ColumnDef, TableSnapshot};
use crate::store::{Store, Table};

/// Bumped only when the framing itself changes, not on schema versions.
pub const FORMAT_VERSION: u16 = 1;

// ============================================================================
// On-disk records
// ============================================================================

/// First frame of every store file. Holds the schema version marker, so the
/// version can be read without decoding any table data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHeader {
    pub format_version: u16,
    pub schema_version: u32,
    pub created_at: u64,
    pub table_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreBody {
    tables: BTreeMap<String, TableRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableRecord {
    columns: Vec<ColumnDef>,
    rows: Vec<Row>,
}

// ============================================================================
// Store file
// ============================================================================

pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads only the header frame; a damaged body does not prevent
    /// discovering which schema version a file claims to hold.
    pub fn peek_header(&self) -> Result<StoreHeader> {
        let file = File::open(&self.path)
            .map_err(|e| MigrateError::IoError(format!("Failed to open store file: {}", e)))?;
        let mut reader = BufReader::new(file);
        let header: StoreHeader = read_frame(&mut reader)?;
        if header.format_version > FORMAT_VERSION {
            return Err(MigrateError::SchemaMismatch(format!(
                "store file format {} is newer than supported format {}",
                header.format_version, FORMAT_VERSION
            )));
        }
        Ok(header)
    }

    pub fn peek_version(&self) -> Result<u32> {
        Ok(self.peek_header()?.schema_version)
    }

    /// Serializes the store and replaces the file atomically: write to a
    /// temp path, fsync, rename over the destination.
    pub fn save(&self, store: &Store) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                MigrateError::IoError(format!("Failed to create store directory: {}", e))
            })?;
        }

        let header = StoreHeader {
            format_version: FORMAT_VERSION,
            schema_version: store.version(),
            created_at: unix_millis(),
            table_count: store.table_names().count(),
        };
        let body = StoreBody {
            tables: store
                .tables()
                .map(|table| {
                    let record = TableRecord {
                        columns: table.snapshot().columns.clone(),
                        rows: table.raw_rows().to_vec(),
                    };
                    (table.name().to_string(), record)
                })
                .collect(),
        };

        let temp_path = self.path.with_extension("tmp");
        let temp_file = File::create(&temp_path)
            .map_err(|e| MigrateError::IoError(format!("Failed to create temp file: {}", e)))?;
        let mut writer = BufWriter::new(temp_file);
        write_frame(&mut writer, &header)?;
        write_frame(&mut writer, &body)?;
        writer
            .flush()
            .map_err(|e| MigrateError::IoError(format!("Failed to flush store file: {}", e)))?;
        writer
            .get_mut()
            .sync_all()
            .map_err(|e| MigrateError::IoError(format!("Failed to sync store file: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| MigrateError::IoError(format!("Failed to rename store file: {}", e)))?;
        Ok(())
    }

    /// Loads the store and validates it table by table against the expected
    /// shapes for `version`. Shape drift, a table the registry does not know
    /// (which the engine would otherwise silently drop on the next write),
    /// and a missing table are all refused.
    pub fn load(
        &self,
        version: u32,
        shapes: &BTreeMap<String, Arc<TableSnapshot>>,
    ) -> Result<Store> {
        let file = File::open(&self.path)
            .map_err(|e| MigrateError::IoError(format!("Failed to open store file: {}", e)))?;
        let mut reader = BufReader::new(file);

        let header: StoreHeader = read_frame(&mut reader)?;
        if header.format_version > FORMAT_VERSION {
            return Err(MigrateError::SchemaMismatch(format!(
                "store file format {} is newer than supported format {}",
                header.format_version, FORMAT_VERSION
            )));
        }
        if header.schema_version != version {
            return Err(MigrateError::SchemaMismatch(format!(
                "store file holds version {}, expected {}",
                header.schema_version, version
            )));
        }

        let body: StoreBody = read_frame(&mut reader)?;

        let mut tables = BTreeMap::new();
        for (name, record) in body.tables {
            let expected = shapes.get(&name).ok_or_else(|| {
                MigrateError::SchemaMismatch(format!(
                    "store contains table '{}' unknown at version {}",
                    name, version
                ))
            })?;
            let stored = TableSnapshot::new(version, name.clone(), record.columns);
            if !stored.same_shape(expected) {
                return Err(MigrateError::SchemaMismatch(format!(
                    "table '{}' does not match its version {} shape",
                    name, version
                )));
            }
            tables.insert(name, Table::from_rows(expected.clone(), record.rows)?);
        }

        for name in shapes.keys() {
            if !tables.contains_key(name) {
                return Err(MigrateError::SchemaMismatch(format!(
                    "store is missing table '{}' required at version {}",
                    name, version
                )));
            }
        }

        Ok(Store::from_tables(version, tables))
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let serialized = rmp_serde::to_vec(value)
        .map_err(|e| MigrateError::Codec(format!("Failed to serialize frame: {}", e)))?;
    let len = serialized.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| MigrateError::IoError(format!("Failed to write frame length: {}", e)))?;
    writer
        .write_all(&serialized)
        .map_err(|e| MigrateError::IoError(format!("Failed to write frame: {}", e)))?;
    Ok(())
}

fn read_frame<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| MigrateError::IoError(format!("Failed to read frame length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .map_err(|e| MigrateError::IoError(format!("Failed to read frame data: {}", e)))?;
    rmp_serde::from_slice(&data)
        .map_err(|e| MigrateError::Codec(format!("Failed to deserialize frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use tempfile::TempDir;

    fn shapes(version: u32) -> BTreeMap<String, Arc<TableSnapshot>> {
        let mut shapes = BTreeMap::new();
        shapes.insert(
            "user".to_string(),
            Arc::new(TableSnapshot::new(
                version,
                "user",
                vec![
                    ColumnDef::new("id", DataType::Text).not_null(),
                    ColumnDef::new("age", DataType::Integer),
                ],
            )),
        );
        shapes
    }

    fn sample_store(version: u32) -> Store {
        let mut store = Store::empty(version, &shapes(version));
        store
            .table_mut("user")
            .unwrap()
            .insert(vec![Value::Text("u1".into()), Value::Integer(41)])
            .unwrap();
        store
    }

    #[test]
    fn test_save_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let file = StoreFile::new(temp_dir.path().join("db.mdb"));

        file.save(&sample_store(3)).unwrap();
        assert!(file.exists());
        assert_eq!(file.peek_version().unwrap(), 3);

        let loaded = file.load(3, &shapes(3)).unwrap();
        assert_eq!(loaded.version(), 3);
        assert_eq!(loaded.table("user").unwrap().row_count(), 1);
    }

    #[test]
    fn test_peek_survives_damaged_body() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.mdb");
        let file = StoreFile::new(&path);
        file.save(&sample_store(5)).unwrap();

        // Chop the file right after the header frame.
        let bytes = fs::read(&path).unwrap();
        let header_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        fs::write(&path, &bytes[..4 + header_len + 2]).unwrap();

        assert_eq!(file.peek_version().unwrap(), 5);
        assert!(file.load(5, &shapes(5)).is_err());
    }

    #[test]
    fn test_load_rejects_wrong_version() {
        let temp_dir = TempDir::new().unwrap();
        let file = StoreFile::new(temp_dir.path().join("db.mdb"));
        file.save(&sample_store(2)).unwrap();

        let err = file.load(3, &shapes(3)).unwrap_err();
        assert!(matches!(err, MigrateError::SchemaMismatch(_)));
    }

    #[test]
    fn test_load_rejects_unknown_table() {
        let temp_dir = TempDir::new().unwrap();
        let file = StoreFile::new(temp_dir.path().join("db.mdb"));

        let mut all_shapes = shapes(1);
        all_shapes.insert(
            "ghost".to_string(),
            Arc::new(TableSnapshot::new(
                1,
                "ghost",
                vec![ColumnDef::new("id", DataType::Text)],
            )),
        );
        let store = Store::empty(1, &all_shapes);
        file.save(&store).unwrap();

        // Registry without "ghost" refuses the file rather than dropping it.
        let err = file.load(1, &shapes(1)).unwrap_err();
        assert!(matches!(err, MigrateError::SchemaMismatch(_)));
    }

    #[test]
    fn test_load_rejects_shape_drift() {
        let temp_dir = TempDir::new().unwrap();
        let file = StoreFile::new(temp_dir.path().join("db.mdb"));
        file.save(&sample_store(1)).unwrap();

        let mut drifted = BTreeMap::new();
        drifted.insert(
            "user".to_string(),
            Arc::new(TableSnapshot::new(
                1,
                "user",
                vec![
                    ColumnDef::new("id", DataType::Text).not_null(),
                    ColumnDef::new("age", DataType::Text),
                ],
            )),
        );
        let err = file.load(1, &drifted).unwrap_err();
        assert!(matches!(err, MigrateError::SchemaMismatch(_)));
    }
}
