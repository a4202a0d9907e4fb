//! Mock mount executor for testing.
//!
//! Produces `MountAttempt`s without spawning processes. Outcomes can be set
//! per URI, and an optional delay simulates a slow mount command.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{MountAttempt, MountError, MountExecutor, MountResult};
use crate::bookmarks::ShareEntry;

/// Counter for generating fake PIDs.
static MOCK_PID_COUNTER: AtomicU32 = AtomicU32::new(10_000);

/// Scripted result for one URI.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Exit with the given status and stderr.
    Exit { status: i32, stderr: String },
    /// Fail to start the command.
    SpawnError(String),
    /// Sleep for the given time before exiting with status 0.
    Delayed(Duration),
}

impl MockOutcome {
    /// Exit with a non-zero status and stderr
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            status,
            stderr: stderr.into(),
        }
    }
}

/// Mount executor that records calls and returns scripted outcomes.
///
/// URIs without a scripted outcome succeed immediately. Clones share the
/// recorded call list.
#[derive(Debug, Clone, Default)]
pub struct MockMountExecutor {
    outcomes: Arc<HashMap<String, MockOutcome>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockMountExecutor {
    /// Create an executor where every mount succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for one URI.
    pub fn with_outcome(mut self, uri: impl Into<String>, outcome: MockOutcome) -> Self {
        Arc::make_mut(&mut self.outcomes).insert(uri.into(), outcome);
        self
    }

    /// URIs passed to `mount`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MountExecutor for MockMountExecutor {
    async fn mount(&self, share: &ShareEntry) -> MountResult<MountAttempt> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(share.uri().to_string());
        }

        let pid = Some(MOCK_PID_COUNTER.fetch_add(1, Ordering::SeqCst));
        let (status, stderr) = match self.outcomes.get(share.uri()) {
            None => (0, String::new()),
            Some(MockOutcome::Exit { status, stderr }) => (*status, stderr.clone()),
            Some(MockOutcome::SpawnError(message)) => {
                return Err(MountError::Spawn {
                    uri: share.uri().to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
                });
            }
            Some(MockOutcome::Delayed(delay)) => {
                tokio::time::sleep(*delay).await;
                (0, String::new())
            }
        };

        Ok(MountAttempt {
            share: share.clone(),
            pid,
            status: Some(status),
            stdout: String::new(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(uri: &str) -> ShareEntry {
        ShareEntry::parse(uri).unwrap()
    }

    #[tokio::test]
    async fn test_mock_default_succeeds() {
        let exec = MockMountExecutor::new();
        let attempt = exec.mount(&share("smb://a/x")).await.unwrap();
        assert!(attempt.succeeded());
        assert!(attempt.pid.is_some());
        assert_eq!(exec.calls(), vec!["smb://a/x"]);
    }

    #[tokio::test]
    async fn test_mock_scripted_failure() {
        let exec = MockMountExecutor::new().with_outcome(
            "smb://a/x",
            MockOutcome::failure(1, "mount error: connection refused"),
        );
        let attempt = exec.mount(&share("smb://a/x")).await.unwrap();
        assert_eq!(attempt.status, Some(1));
        assert_eq!(attempt.stderr, "mount error: connection refused");
    }

    #[tokio::test]
    async fn test_mock_spawn_error() {
        let exec = MockMountExecutor::new()
            .with_outcome("smb://a/x", MockOutcome::SpawnError("no gvfs".to_string()));
        assert!(matches!(
            exec.mount(&share("smb://a/x")).await,
            Err(MountError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_unique_pids() {
        let exec = MockMountExecutor::new();
        let a = exec.mount(&share("smb://a/x")).await.unwrap();
        let b = exec.mount(&share("smb://b/y")).await.unwrap();
        assert_ne!(a.pid, b.pid);
    }

    #[tokio::test]
    async fn test_mock_clones_share_calls() {
        let exec = MockMountExecutor::new();
        let clone = exec.clone();
        clone.mount(&share("smb://a/x")).await.unwrap();
        assert_eq!(exec.calls().len(), 1);
    }
}
