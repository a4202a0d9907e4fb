//! Single-instance admission through a per-user lock file.
//!
//! The lock file holds the decimal PID of the owning daemon. Its presence,
//! not its content, blocks a second instance; the content only feeds the log
//! message. Creation uses `O_EXCL` so two racing starts cannot both succeed.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while acquiring the lock
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another instance is already running (lock {path:?} held by pid {owner})")]
    AlreadyRunning { path: PathBuf, owner: String },

    #[error("Could not write lock file {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Proof that this process is the only running daemon.
///
/// Dropping the guard releases the lock; `release` does the same explicitly.
#[derive(Debug)]
pub struct SingleInstanceGuard {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl SingleInstanceGuard {
    /// Create the lock file and record the current PID in it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let pid = std::process::id();

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(LockError::AlreadyRunning { path, owner });
            }
            Err(source) => return Err(LockError::Persistence { path, source }),
        };

        if let Err(source) = file.write_all(pid.to_string().as_bytes()) {
            // Do not leave a half-written lock behind that would block restarts
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(LockError::Persistence { path, source });
        }

        debug!("Wrote lock file: {:?} (pid={})", path, pid);
        Ok(Self {
            path,
            pid,
            released: false,
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the lock file
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Remove the lock file. Failures are logged, never returned.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed lock file: {:?}", self.path),
            Err(e) => warn!("Failed to remove lock file {:?}: {}", self.path, e),
        }
    }
}

impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        self.release();
    }
}
