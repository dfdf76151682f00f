use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::{MigrateError, Result};

/// Bounded exponential backoff for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockRetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 50,
            max_delay_ms: 1000,
        }
    }
}

/// Exclusive advisory lock held for the duration of a migration run.
///
/// Backed by a `create_new` lock file next to the store; released on drop.
/// A process that dies mid-run leaves the file behind, which is the
/// operator's signal that the previous run did not finish cleanly.
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    pub fn acquire<P: AsRef<Path>>(path: P, policy: LockRetryPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut delay = policy.initial_delay_ms;

        for attempt in 1..=policy.max_attempts {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Lock content is advisory; holder pid for diagnostics.
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        debug!("Could not write pid to lock file: {}", e);
                    }
                    info!("Acquired store lock at {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt == policy.max_attempts {
                        break;
                    }
                    debug!(
                        "Store lock {} busy (attempt {}/{}), retrying in {}ms",
                        path.display(),
                        attempt,
                        policy.max_attempts,
                        delay
                    );
                    thread::sleep(Duration::from_millis(delay));
                    delay = delay.saturating_mul(2).min(policy.max_delay_ms);
                }
                Err(e) => {
                    return Err(MigrateError::IoError(format!(
                        "Failed to create lock file {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Err(MigrateError::Locked(
            path.display().to_string(),
            policy.max_attempts,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                "Failed to remove lock file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
