//! Run lock - at most one dispatched run per working directory

use crate::core::RunError;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock on a working directory, released on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Lock file location for `working_dir`
    ///
    /// Inside `.git` when the directory is a git checkout, so the lock never
    /// appears as an untracked file.
    pub fn path_for(working_dir: &Path) -> PathBuf {
        let git_dir = working_dir.join(".git");
        if git_dir.is_dir() {
            git_dir.join("ci-runner.lock")
        } else {
            working_dir.join(".ci-runner.lock")
        }
    }

    /// Take the lock, failing with `AlreadyRunning` if it is held
    pub fn acquire(working_dir: &Path, run_label: &str) -> Result<Self, RunError> {
        let path = Self::path_for(working_dir);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RunError::AlreadyRunning { path });
            }
            Err(e) => {
                return Err(RunError::Lock {
                    path,
                    message: e.to_string(),
                });
            }
        };

        // Holder info is informational only
        if let Err(e) = writeln!(file, "{} pid={}", run_label, std::process::id()) {
            warn!("Failed to write run lock contents: {}", e);
        }

        debug!("Acquired run lock {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Released run lock {}", self.path.display()),
            Err(e) => warn!("Failed to remove run lock {}: {}", self.path.display(), e),
        }
    }
}
