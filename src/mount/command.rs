//! Mount executor that runs an external program (gvfs-mount by default).

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{MountAttempt, MountError, MountExecutor, MountResult};
use crate::bookmarks::ShareEntry;

/// Runs `<program> [args...] <share-uri>` and waits for it to exit.
///
/// The child is not killed if the waiting task is dropped, so a mount
/// that is in flight at shutdown still runs to completion.
#[derive(Debug, Clone)]
pub struct CommandMountExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandMountExecutor {
    /// Build an executor from an argv prefix such as `["gio", "mount"]`.
    pub fn from_argv(argv: &[String]) -> MountResult<Self> {
        let (program, args) = argv.split_first().ok_or(MountError::NoCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Program that gets executed
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl MountExecutor for CommandMountExecutor {
    async fn mount(&self, share: &ShareEntry) -> MountResult<MountAttempt> {
        let spawn_error = |source| MountError::Spawn {
            uri: share.uri().to_string(),
            source,
        };

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(share.uri())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(spawn_error)?;

        let pid = child.id();
        debug!(share = %share, pid, program = %self.program, "Spawned mount command");

        let output = child.wait_with_output().await.map_err(spawn_error)?;

        Ok(MountAttempt {
            share: share.clone(),
            pid,
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
