//! Mount command execution
//!
//! A mount attempt runs the external mount command for one share and records
//! its PID, exit status and trimmed output. A non-zero exit is an outcome,
//! not an error; only failing to start the command is reported as an error.

use async_trait::async_trait;
use std::fmt;
use std::io;
use thiserror::Error;

use crate::bookmarks::ShareEntry;

mod command;
pub mod mock;

pub use command::CommandMountExecutor;

/// Error types for mount operations
#[derive(Debug, Error)]
pub enum MountError {
    #[error("Mount command not configured")]
    NoCommand,

    #[error("Failed to run mount command for {uri}: {source}")]
    Spawn {
        uri: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for mount operations
pub type MountResult<T> = Result<T, MountError>;

/// Outcome of one mount invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountAttempt {
    /// Share that was mounted
    pub share: ShareEntry,
    /// PID of the mount process, if the OS reported one
    pub pid: Option<u32>,
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
    /// Captured standard output, trimmed
    pub stdout: String,
    /// Captured standard error, trimmed
    pub stderr: String,
}

impl MountAttempt {
    /// Whether the mount command exited with status 0
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

impl fmt::Display for MountAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        };

        if self.succeeded() {
            write!(f, "Share {} has been mounted: ret_val == {}", self.share, status)
        } else {
            write!(
                f,
                "Share {} could not be mounted: ret_val == {}",
                self.share, status
            )?;
            if !self.stderr.is_empty() {
                write!(f, ": {}", self.stderr)?;
            }
            Ok(())
        }
    }
}

/// Runs the mount command for a single share.
///
/// Implementations wait for their own child only; concurrent calls must not
/// affect each other.
#[async_trait]
pub trait MountExecutor: Send + Sync {
    /// Mount the share and report how the command ended
    async fn mount(&self, share: &ShareEntry) -> MountResult<MountAttempt>;
}
