//! End-to-end tests for the mount cycle and daemon lifecycle.
//!
//! These drive the `Orchestrator` through `run_event_loop` with a mock vault
//! and a mock mount executor, so no bus or real mount command is needed.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use zbus::zvariant::OwnedObjectPath;

use gtk_bookmarks_automount::bookmarks::BookmarkSource;
use gtk_bookmarks_automount::bus::session::EndSessionResponder;
use gtk_bookmarks_automount::bus::{
    event_channel, DaemonEvent, LifecycleError, NetworkState, SessionClientHandle,
    SessionLifecycleClient, SessionSignal,
};
use gtk_bookmarks_automount::daemon::{
    run_event_loop, EventHandler, LoopControl, MountDispatcher, MountReport, Orchestrator,
};
use gtk_bookmarks_automount::lock::SingleInstanceGuard;
use gtk_bookmarks_automount::mount::mock::{MockMountExecutor, MockOutcome};
use gtk_bookmarks_automount::vault::mock::MockVault;
use gtk_bookmarks_automount::vault::CredentialOracle;

const CONNECTED_GLOBAL: u32 = 70;
const CONNECTING: u32 = 40;

/// Everything a scenario needs to inspect after running.
struct Harness {
    orchestrator: Orchestrator,
    results: mpsc::UnboundedReceiver<MountReport>,
    vault: MockVault,
    executor: MockMountExecutor,
    _dir: TempDir,
}

fn harness(bookmarks: &str, vault: MockVault, executor: MockMountExecutor) -> Harness {
    harness_with_session(bookmarks, vault, executor, None)
}

fn harness_with_session(
    bookmarks: &str,
    vault: MockVault,
    executor: MockMountExecutor,
    session: Option<SessionLifecycleClient>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bookmarks");
    fs::write(&path, bookmarks).unwrap();

    let (dispatcher, results) = MountDispatcher::new(
        CredentialOracle::new(Arc::new(vault.clone())),
        Arc::new(executor.clone()),
    );
    let source = BookmarkSource::new(path, vec!["smb://".to_string()]);

    Harness {
        orchestrator: Orchestrator::new(source, dispatcher, session),
        results,
        vault,
        executor,
        _dir: dir,
    }
}

/// Drop the orchestrator and collect every report the workers deliver.
async fn finish(harness: Harness) -> (Vec<MountReport>, MockVault, MockMountExecutor) {
    let Harness {
        orchestrator,
        mut results,
        vault,
        executor,
        _dir,
    } = harness;
    drop(orchestrator);

    let mut reports = Vec::new();
    let collect = async {
        while let Some(report) = results.recv().await {
            reports.push(report);
        }
    };
    tokio::time::timeout(Duration::from_secs(5), collect)
        .await
        .expect("workers should finish");

    (reports, vault, executor)
}

fn state(code: u32) -> DaemonEvent {
    DaemonEvent::NetworkStateChanged(NetworkState::from(code))
}

#[derive(Clone, Default)]
struct CountingResponder {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EndSessionResponder for CountingResponder {
    async fn end_session_response(&self, accept: bool, _reason: &str) -> Result<(), LifecycleError> {
        assert!(accept, "the daemon always agrees to end the session");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn registered_client(responder: CountingResponder) -> SessionLifecycleClient {
    let path = OwnedObjectPath::try_from("/org/gnome/SessionManager/Client1").unwrap();
    SessionLifecycleClient::with_responder(SessionClientHandle::new(path), Box::new(responder))
}

// ============================================================================
// Bookmark filtering
// ============================================================================

#[tokio::test]
async fn test_scenario_a_only_watched_shares_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bookmarks");
    fs::write(
        &path,
        "smb://server1/share\nhttp://example.com\nsmb://server2/share",
    )
    .unwrap();

    let source = BookmarkSource::new(&path, vec!["smb://".to_string()]);
    assert_eq!(
        source.read_shares().await,
        vec!["smb://server1/share", "smb://server2/share"]
    );
}

#[tokio::test]
async fn test_bookmarks_reread_every_time() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bookmarks");
    let source = BookmarkSource::new(&path, vec!["smb://".to_string()]);

    fs::write(&path, "smb://a/x\n").unwrap();
    assert_eq!(source.read_shares().await, vec!["smb://a/x"]);

    fs::write(&path, "smb://a/x\nsmb://b/y\n").unwrap();
    assert_eq!(source.read_shares().await, vec!["smb://a/x", "smb://b/y"]);
}

// ============================================================================
// Mount cycle
// ============================================================================

#[tokio::test]
async fn test_scenario_b_only_credentialed_share_is_mounted() {
    let vault = MockVault::new().with_credentials("smb", "server1", 1);
    let mut h = harness(
        "smb://server1/share\nsmb://server2/share\n",
        vault,
        MockMountExecutor::new(),
    );

    let (tx, mut rx) = event_channel();
    tx.send(state(CONNECTED_GLOBAL)).unwrap();
    drop(tx);
    run_event_loop(&mut h.orchestrator, &mut rx).await;

    let (reports, vault, executor) = finish(h).await;
    assert_eq!(reports.len(), 1);
    let attempt = reports[0].as_ref().unwrap();
    assert_eq!(attempt.share.uri(), "smb://server1/share");
    assert!(attempt.succeeded());

    assert_eq!(executor.calls(), vec!["smb://server1/share"]);
    assert_eq!(vault.lookups(), 2);
}

#[tokio::test]
async fn test_scenario_c_connecting_does_nothing() {
    let vault = MockVault::new().with_credentials("smb", "server1", 1);
    let mut h = harness("smb://server1/share\n", vault, MockMountExecutor::new());

    let (tx, mut rx) = event_channel();
    tx.send(state(CONNECTING)).unwrap();
    drop(tx);
    run_event_loop(&mut h.orchestrator, &mut rx).await;

    let (reports, vault, executor) = finish(h).await;
    assert!(reports.is_empty());
    assert_eq!(vault.lookups(), 0);
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_scenario_d_failed_mount_is_reported_and_loop_continues() {
    let executor = MockMountExecutor::new().with_outcome(
        "smb://server1/share",
        MockOutcome::failure(1, "mount error: connection refused"),
    );
    let vault = MockVault::new().with_credentials("smb", "server1", 1);
    let mut h = harness("smb://server1/share\n", vault, executor);

    let control = h.orchestrator.handle_event(state(CONNECTED_GLOBAL)).await;
    assert_eq!(control, LoopControl::Continue);

    // The loop keeps serving events after the failure
    let (tx, mut rx) = event_channel();
    tx.send(state(CONNECTED_GLOBAL)).unwrap();
    drop(tx);
    run_event_loop(&mut h.orchestrator, &mut rx).await;

    let (reports, _, executor) = finish(h).await;
    assert_eq!(reports.len(), 2);
    for report in &reports {
        let attempt = report.as_ref().unwrap();
        assert_eq!(attempt.status, Some(1));
        assert_eq!(attempt.stderr, "mount error: connection refused");
        assert!(attempt
            .to_string()
            .contains("could not be mounted: ret_val == 1: mount error: connection refused"));
    }
    assert_eq!(executor.calls().len(), 2);
}

#[tokio::test]
async fn test_vault_failure_never_mounts() {
    let vault = MockVault::new()
        .with_credentials("smb", "server1", 1)
        .failing("org.freedesktop.DBus.Error.ServiceUnknown");
    let mut h = harness("smb://server1/share\n", vault, MockMountExecutor::new());

    h.orchestrator.handle_event(state(CONNECTED_GLOBAL)).await;

    let (reports, vault, executor) = finish(h).await;
    assert!(reports.is_empty());
    assert_eq!(vault.lookups(), 1);
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_spawn_failure_does_not_affect_other_shares() {
    let executor = MockMountExecutor::new()
        .with_outcome("smb://a/x", MockOutcome::SpawnError("gvfs-mount missing".to_string()));
    let vault = MockVault::new()
        .with_credentials("smb", "a", 1)
        .with_credentials("smb", "b", 1);
    let mut h = harness("smb://a/x\nsmb://b/y\n", vault, executor);

    h.orchestrator.handle_event(state(CONNECTED_GLOBAL)).await;

    let (reports, _, _) = finish(h).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports.iter().filter(|r| r.is_err()).count(), 1);
    let mounted: Vec<_> = reports
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|a| a.share.uri().to_string())
        .collect();
    assert_eq!(mounted, vec!["smb://b/y"]);
}

#[tokio::test]
async fn test_slow_mount_does_not_stall_event_loop() {
    let executor = MockMountExecutor::new()
        .with_outcome("smb://a/x", MockOutcome::Delayed(Duration::from_secs(60)));
    let vault = MockVault::new().with_credentials("smb", "a", 1);
    let mut h = harness("smb://a/x\n", vault, executor);

    let (tx, mut rx) = event_channel();
    tx.send(state(CONNECTED_GLOBAL)).unwrap();
    tx.send(DaemonEvent::Terminate).unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        run_event_loop(&mut h.orchestrator, &mut rx),
    )
    .await
    .expect("event loop must not wait for mounts");
}

// ============================================================================
// Session lifecycle and shutdown
// ============================================================================

#[tokio::test]
async fn test_session_end_queries_are_answered() {
    let responder = CountingResponder::default();
    let mut h = harness_with_session(
        "",
        MockVault::new(),
        MockMountExecutor::new(),
        Some(registered_client(responder.clone())),
    );

    let (tx, mut rx) = event_channel();
    tx.send(DaemonEvent::Session(SessionSignal::QueryEnd { flags: 0 }))
        .unwrap();
    tx.send(DaemonEvent::Session(SessionSignal::CancelEnd)).unwrap();
    tx.send(DaemonEvent::Session(SessionSignal::End { flags: 1 }))
        .unwrap();
    drop(tx);
    run_event_loop(&mut h.orchestrator, &mut rx).await;

    assert_eq!(responder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_scenario_e_stop_ends_loop_and_releases_lock() {
    let dir = TempDir::new().unwrap();
    let lock_path = dir.path().join("automount.lock");
    let mut guard = SingleInstanceGuard::acquire(&lock_path).unwrap();
    assert!(lock_path.exists());

    let vault = MockVault::new().with_credentials("smb", "server1", 1);
    let mut h = harness_with_session(
        "smb://server1/share\n",
        vault,
        MockMountExecutor::new(),
        Some(registered_client(CountingResponder::default())),
    );

    let (tx, mut rx) = event_channel();
    tx.send(DaemonEvent::Session(SessionSignal::Stop)).unwrap();
    // Must never be processed
    tx.send(state(CONNECTED_GLOBAL)).unwrap();

    run_event_loop(&mut h.orchestrator, &mut rx).await;
    guard.release();

    assert!(!lock_path.exists());
    assert!(rx.try_recv().is_ok(), "event after Stop stays queued");

    let (reports, vault, executor) = finish(h).await;
    assert!(reports.is_empty());
    assert_eq!(vault.lookups(), 0);
    assert!(executor.calls().is_empty());
}

#[test]
fn test_second_instance_is_refused() {
    let dir = TempDir::new().unwrap();
    let lock_path = dir.path().join("automount.lock");

    let _first = SingleInstanceGuard::acquire(&lock_path).unwrap();
    let second = SingleInstanceGuard::acquire(&lock_path);
    assert!(second.is_err());
}
