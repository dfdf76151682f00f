//! Filesystem companion of the row transforms.
//!
//! Rows frequently point at files on disk; when a step rewrites those rows
//! the referenced files have to follow. All paths are relative to a single
//! asset root. Moves happen immediately but are journaled so a failed run
//! can put every file back; removals are destructive and therefore deferred
//! until the run has committed its final store file.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::core::{MigrateError, Result, Value};

#[derive(Debug)]
enum MoveRecord {
    Moved { from: PathBuf, to: PathBuf },
}

#[derive(Debug)]
enum DeferredOp {
    RemoveFile(PathBuf),
    RemoveDir(PathBuf),
}

pub struct AssetMigrator {
    root: PathBuf,
    journal: Vec<MoveRecord>,
    deferred: Vec<DeferredOp>,
}

impl AssetMigrator {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            journal: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).exists()
    }

    /// Creates a directory (and parents) under the root. Repeatable; used by
    /// prologues to prepare target layouts.
    pub fn ensure_dir(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative);
        fs::create_dir_all(&path).map_err(|e| {
            MigrateError::Asset("mkdir", path.display().to_string(), e.to_string())
        })
    }

    /// Moves one file to a new location under the root, journaling the move
    /// for rollback. A missing source is skipped with a warning: stores
    /// routinely reference files that were cleaned up out of band.
    pub fn move_asset(&mut self, from: &str, to: &str) -> Result<()> {
        let from_path = self.resolve(from);
        let to_path = self.resolve(to);

        if !from_path.exists() {
            warn!("Asset {} is gone, nothing to move", from_path.display());
            return Ok(());
        }
        if to_path.exists() {
            return Err(MigrateError::Asset(
                "move",
                to_path.display().to_string(),
                "target already exists".to_string(),
            ));
        }
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                MigrateError::Asset("move", to_path.display().to_string(), e.to_string())
            })?;
        }

        move_file(&from_path, &to_path)?;
        debug!("Moved asset {} -> {}", from_path.display(), to_path.display());
        self.journal.push(MoveRecord::Moved {
            from: from_path,
            to: to_path,
        });
        Ok(())
    }

    /// Reads a file into a BLOB cell, for steps that fold loose files into
    /// table rows. Read-only, so nothing is journaled; pair it with
    /// `remove` when the source file is to disappear.
    pub fn encode_into_row(&self, relative: &str) -> Result<Value> {
        let path = self.resolve(relative);
        let bytes = fs::read(&path).map_err(|e| {
            MigrateError::Asset("read", path.display().to_string(), e.to_string())
        })?;
        Ok(Value::Blob(bytes))
    }

    /// Schedules a file removal for after the run commits. A path already
    /// absent by then is not an error.
    pub fn remove(&mut self, relative: &str) {
        self.deferred.push(DeferredOp::RemoveFile(self.resolve(relative)));
    }

    /// Schedules a directory tree removal for after the run commits.
    pub fn remove_dir(&mut self, relative: &str) {
        self.deferred.push(DeferredOp::RemoveDir(self.resolve(relative)));
    }

    pub fn pending_removals(&self) -> usize {
        self.deferred.len()
    }

    pub fn moves_performed(&self) -> usize {
        self.journal.len()
    }

    /// Undoes every journaled move, newest first, and drops the deferred
    /// queue. Best-effort: a file that cannot be put back is logged and
    /// skipped so the root cause of the abort stays the reported error.
    pub fn rollback(&mut self) {
        if !self.journal.is_empty() {
            info!("Rolling back {} asset move(s)", self.journal.len());
        }
        while let Some(record) = self.journal.pop() {
            match record {
                MoveRecord::Moved { from, to } => {
                    if let Err(e) = move_file(&to, &from) {
                        warn!(
                            "Could not restore asset {} -> {}: {}",
                            to.display(),
                            from.display(),
                            e
                        );
                    }
                }
            }
        }
        self.deferred.clear();
    }

    /// Applies the deferred removals and forgets the journal. Called only
    /// after the final store file is in place; failures are warnings since
    /// the data migration itself has already succeeded.
    pub fn commit(&mut self) {
        for op in self.deferred.drain(..) {
            let result = match &op {
                DeferredOp::RemoveFile(path) => {
                    if path.exists() {
                        fs::remove_file(path)
                    } else {
                        Ok(())
                    }
                }
                DeferredOp::RemoveDir(path) => {
                    if path.exists() {
                        fs::remove_dir_all(path)
                    } else {
                        Ok(())
                    }
                }
            };
            if let Err(e) = result {
                let path = match op {
                    DeferredOp::RemoveFile(p) | DeferredOp::RemoveDir(p) => p,
                };
                warn!("Deferred removal of {} failed: {}", path.display(), e);
            }
        }
        self.journal.clear();
    }
}

/// Rename, falling back to copy+delete when the rename fails (the asset
/// root may span filesystems).
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .and_then(|_| fs::remove_file(from))
        .map_err(|e| MigrateError::Asset("move", from.display().to_string(), e.to_string()))?;
    Ok(())
}
