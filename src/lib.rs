// ============================================================================
// SchemaLift Library
// ============================================================================

pub mod appdata;
pub mod assets;
pub mod catalog;
pub mod core;
pub mod engine;
pub mod schema;
pub mod store;

// Re-export main types for convenience
pub use appdata::AppData;
pub use core::{DataType, MigrateError, Result, Value};
pub use engine::{
    MigrationPlan, MigrationReport, MigrationRun, MigrationSettings, StepDescriptor,
};
pub use store::{Store, StoreFile};

// ============================================================================
// High-level migration API
// ============================================================================

/// Upgrades a store file to the current schema version using the built-in
/// version history.
///
/// This is the recommended way to run migrations from a hosting
/// application: it reads the on-disk version, resolves the step chain and
/// executes it under the store lock, leaving the original file untouched
/// unless every step succeeds.
///
/// # Examples
///
/// ```
/// use schemalift::{catalog, Migrator, MigrationSettings};
/// use schemalift::store::{Store, StoreFile};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::tempdir()?;
/// # let db = dir.path().join("store.db");
/// # let shapes = catalog::registry()
/// #     .tables_at(catalog::CURRENT_VERSION)
/// #     .unwrap();
/// # StoreFile::new(&db).save(&Store::empty(catalog::CURRENT_VERSION, shapes))?;
/// let settings = MigrationSettings::new(&db, dir.path().join("files"));
/// let report = Migrator::new(settings).run()?;
/// assert!(report.is_noop());
/// # Ok(())
/// # }
/// ```
pub struct Migrator {
    settings: MigrationSettings,
    appdata: AppData,
}

impl Migrator {
    pub fn new(settings: MigrationSettings) -> Self {
        Self {
            settings,
            appdata: AppData::empty(),
        }
    }

    /// Supplies the localized default texts some steps seed rows from.
    pub fn with_appdata(mut self, appdata: AppData) -> Self {
        self.appdata = appdata;
        self
    }

    /// The schema version recorded in the configured store file.
    pub fn store_version(&self) -> Result<u32> {
        StoreFile::new(&self.settings.db_path).peek_version()
    }

    /// How many steps separate the store from the current version.
    pub fn pending_steps(&self) -> Result<usize> {
        Ok(catalog::plan().resolve(self.store_version()?)?.len())
    }

    /// Runs the built-in chain against the configured store.
    pub fn run(&self) -> Result<MigrationReport> {
        let on_disk = self.store_version()?;
        MigrationRun::new(catalog::plan(), self.settings.clone(), &self.appdata).execute(on_disk)
    }
}
