use crate::appdata::AppData;
use crate::assets::AssetMigrator;
use crate::core::{Result, RowBuilder, SourceRow};
use crate::store::Store;

/// Everything a transform or hook may touch while one step runs.
///
/// The old store is read-only; the new store accepts inserts; assets mirror
/// row changes on the filesystem; the appdata bundle supplies localized
/// defaults. Reads hand out owned `SourceRow`s, so a transform can iterate
/// old rows while inserting into the new store.
pub struct StepContext<'a> {
    version: u32,
    old: &'a Store,
    new: &'a mut Store,
    assets: &'a mut AssetMigrator,
    appdata: &'a AppData,
}

impl<'a> StepContext<'a> {
    pub fn new(
        version: u32,
        old: &'a Store,
        new: &'a mut Store,
        assets: &'a mut AssetMigrator,
        appdata: &'a AppData,
    ) -> Self {
        Self {
            version,
            old,
            new,
            assets,
            appdata,
        }
    }

    /// The version being migrated away from; the new store is at this + 1.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn target_version(&self) -> u32 {
        self.version + 1
    }

    pub fn old(&self) -> &Store {
        self.old
    }

    pub fn new_store(&mut self) -> &mut Store {
        self.new
    }

    pub fn assets(&mut self) -> &mut AssetMigrator {
        self.assets
    }

    pub fn appdata(&self) -> &AppData {
        self.appdata
    }

    /// All rows of an old table, as owned views.
    pub fn old_rows(&self, table: &str) -> Result<Vec<SourceRow>> {
        Ok(self.old.table(table)?.rows().collect())
    }

    /// A builder shaped by the new store's snapshot of `table`, prefilled
    /// with the declared column defaults.
    pub fn new_row(&self, table: &str) -> Result<RowBuilder> {
        Ok(RowBuilder::new(self.new.table(table)?.snapshot().clone()))
    }

    pub fn insert(&mut self, table: &str, row: RowBuilder) -> Result<()> {
        self.new.table_mut(table)?.insert(row.build())
    }

    /// Copies a whole table across unchanged columns: every old row becomes
    /// a new row via `copy_common`, new columns get their defaults. Returns
    /// the number of rows written.
    pub fn copy_table(&mut self, table: &str) -> Result<usize> {
        let rows = self.old_rows(table)?;
        let count = rows.len();
        for source in rows {
            let row = self.new_row(table)?.copy_common(&source);
            self.insert(table, row)?;
        }
        Ok(count)
    }
}
