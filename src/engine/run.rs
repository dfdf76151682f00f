use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::TempDir;

use crate::appdata::AppData;
use crate::assets::AssetMigrator;
use crate::core::{MigrateError, Result};
use crate::engine::executor::{StepExecutor, StepReport};
use crate::engine::plan::MigrationPlan;
use crate::engine::step::StepDescriptor;
use crate::store::{DualStoreSession, LockRetryPolicy, Store, StoreFile, StoreLock};

const WORKING_FILE: &str = "store.work";

/// Where and how a migration run operates.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// The store file to upgrade in place.
    pub db_path: PathBuf,

    /// Root directory of the filesystem assets rows point at.
    pub files_root: PathBuf,

    /// Directory for working copies; a fresh temporary directory when unset.
    pub workdir: Option<PathBuf>,

    /// Leave the working copies behind after the run, for inspection.
    pub keep_workdir: bool,

    /// Retry behavior when the store lock is held elsewhere.
    pub lock_retry: LockRetryPolicy,
}

impl MigrationSettings {
    pub fn new(db_path: impl Into<PathBuf>, files_root: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            files_root: files_root.into(),
            workdir: None,
            keep_workdir: false,
            lock_retry: LockRetryPolicy::default(),
        }
    }

    /// Set an explicit working directory.
    pub fn workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    /// Keep working copies after the run.
    pub fn keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }

    /// Set the lock retry policy.
    pub fn lock_retry(mut self, policy: LockRetryPolicy) -> Self {
        self.lock_retry = policy;
        self
    }

    fn lock_path(&self) -> PathBuf {
        let mut os = self.db_path.as_os_str().to_os_string();
        os.push(".lock");
        PathBuf::from(os)
    }
}

/// The outcome of a completed run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

enum Workdir {
    Temp(TempDir),
    Fixed(PathBuf),
}

impl Workdir {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

/// Carries a store file through every pending version boundary.
///
/// The original file is copied into a working directory and each step
/// commits there; only after the whole chain has succeeded is the original
/// replaced, atomically, and only then do deferred asset removals run. A
/// failure at any point leaves the original file and (via the asset
/// journal) the asset tree as they were.
pub struct MigrationRun<'a> {
    plan: &'a MigrationPlan,
    settings: MigrationSettings,
    appdata: &'a AppData,
}

impl<'a> MigrationRun<'a> {
    pub fn new(plan: &'a MigrationPlan, settings: MigrationSettings, appdata: &'a AppData) -> Self {
        Self {
            plan,
            settings,
            appdata,
        }
    }

    pub fn execute(&self, on_disk_version: u32) -> Result<MigrationReport> {
        // Resolve before touching anything: an unsupported store must be
        // refused with the file left exactly as found.
        let chain = self.plan.resolve(on_disk_version)?;
        let target = self.plan.target_version();
        if chain.is_empty() {
            info!("Store already at version {}, nothing to migrate", target);
            return Ok(MigrationReport {
                from_version: on_disk_version,
                to_version: target,
                steps: Vec::new(),
            });
        }

        info!(
            "Updating store from version {} to version {} ({} steps)",
            on_disk_version,
            target,
            chain.len()
        );

        let _lock = StoreLock::acquire(self.settings.lock_path(), self.settings.lock_retry)?;

        let workdir = self.open_workdir()?;
        let working = StoreFile::new(workdir.path().join(WORKING_FILE));
        let mut assets = AssetMigrator::new(&self.settings.files_root);

        let outcome = self.run_steps(&chain, &working, &mut assets);
        let (final_store, steps) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                assets.rollback();
                self.close_workdir(workdir);
                return Err(e);
            }
        };

        // The version marker lives in the store header, so the atomic
        // replace of the file is also the marker update.
        if let Err(e) = StoreFile::new(&self.settings.db_path).save(&final_store) {
            assets.rollback();
            self.close_workdir(workdir);
            return Err(e);
        }
        assets.commit();
        self.close_workdir(workdir);

        info!(
            "Store migrated to version {} ({} rows across {} tables)",
            target,
            final_store.total_rows(),
            final_store.table_names().count()
        );
        Ok(MigrationReport {
            from_version: on_disk_version,
            to_version: target,
            steps,
        })
    }

    fn run_steps(
        &self,
        chain: &[&StepDescriptor],
        working: &StoreFile,
        assets: &mut AssetMigrator,
    ) -> Result<(Store, Vec<StepReport>)> {
        fs::copy(&self.settings.db_path, working.path()).map_err(|e| {
            MigrateError::IoError(format!(
                "Failed to copy store into working directory: {}",
                e
            ))
        })?;

        let mut reports = Vec::with_capacity(chain.len());
        let mut migrated: Option<Store> = None;

        for step in chain {
            let session = DualStoreSession::open(
                working,
                step.version(),
                step.from_snapshots(),
                step.target_version(),
                step.to_snapshots(),
            )
            .map_err(|e| e.at_step(step.target_version()))?;

            let (new_store, report) = StepExecutor::apply(step, session, assets, self.appdata)
                .map_err(|e| e.at_step(step.target_version()))?;

            // Per-step commit: the next step reloads (and re-validates)
            // from this file.
            working
                .save(&new_store)
                .map_err(|e| e.at_step(step.target_version()))?;
            reports.push(report);
            migrated = Some(new_store);
        }

        match migrated {
            Some(store) => Ok((store, reports)),
            None => Err(MigrateError::InvalidPlan(
                "resolved chain was empty".to_string(),
            )),
        }
    }

    fn open_workdir(&self) -> Result<Workdir> {
        match &self.settings.workdir {
            Some(path) => {
                fs::create_dir_all(path).map_err(|e| {
                    MigrateError::IoError(format!(
                        "Failed to create working directory {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Workdir::Fixed(path.clone()))
            }
            None => TempDir::new()
                .map(Workdir::Temp)
                .map_err(|e| {
                    MigrateError::IoError(format!("Failed to create working directory: {}", e))
                }),
        }
    }

    fn close_workdir(&self, workdir: Workdir) {
        match workdir {
            Workdir::Temp(dir) => {
                if self.settings.keep_workdir {
                    let path = dir.into_path();
                    info!("Working directory kept at {}", path.display());
                }
                // otherwise dropped here, removing the directory
            }
            Workdir::Fixed(path) => {
                if !self.settings.keep_workdir {
                    if let Err(e) = fs::remove_file(path.join(WORKING_FILE)) {
                        warn!("Could not remove working file: {}", e);
                    }
                }
            }
        }
    }
}
