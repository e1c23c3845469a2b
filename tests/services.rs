//! Overlay and peer sessions running under a lifecycle tree.

use std::sync::Arc;
use std::time::Duration;

use node_lifecycle::config::OverlayConfig;
use node_lifecycle::lifecycle::{LifecycleError, NodeId, Passive, RootNode};
use node_lifecycle::services::{OverlayManager, SessionState};
use tokio::runtime::Handle;

fn fast_config() -> OverlayConfig {
    OverlayConfig {
        peers: 3,
        exchange_interval_ms: 20,
        ack_timeout_ms: 400,
        response_timeout_ms: 500,
    }
}

async fn run_blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::time::timeout(Duration::from_secs(10), tokio::task::spawn_blocking(f))
        .await
        .expect("lifecycle walk did not finish")
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_exchange_and_stop_cleanly() {
    let root = Arc::new(RootNode::new("node", Arc::new(Passive)));
    let overlay = Arc::new(OverlayManager::new(fast_config(), Handle::current()));
    let overlay_node = root.attach(NodeId::ROOT, "overlay", overlay.clone()).unwrap();

    let sessions: Vec<_> = (0..3)
        .map(|_| overlay.add_session(&root, overlay_node.id()).unwrap())
        .collect();
    assert_eq!(overlay.session_count(), 3);
    assert_eq!(root.len(), 5);

    let r = Arc::clone(&root);
    run_blocking(move || r.start()).await;

    tokio::time::sleep(Duration::from_millis(600)).await;

    let r = Arc::clone(&root);
    run_blocking(move || r.stop()).await.unwrap();

    assert_eq!(overlay.session_count(), 0);
    assert!(overlay_node.is_stopped());
    for session in &sessions {
        assert_eq!(session.state(), SessionState::ForceConcluded);
        assert_eq!(session.timeouts(), 0);
    }
    assert!(sessions.iter().any(|s| s.exchanges() > 0));
    assert!(root.snapshot().nodes.iter().all(|n| n.stopped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concluded_session_stops_without_timers() {
    let root = Arc::new(RootNode::new("node", Arc::new(Passive)));
    let overlay = Arc::new(OverlayManager::new(fast_config(), Handle::current()));
    let overlay_node = root.attach(NodeId::ROOT, "overlay", overlay.clone()).unwrap();
    let session = overlay.add_session(&root, overlay_node.id()).unwrap();

    assert!(session.conclude(false));

    let r = Arc::clone(&root);
    run_blocking(move || r.start()).await;
    let r = Arc::clone(&root);
    run_blocking(move || r.stop()).await.unwrap();

    assert_eq!(session.state(), SessionState::Concluded);
    assert_eq!(session.exchanges(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_sessions_after_stop() {
    let root = Arc::new(RootNode::new("node", Arc::new(Passive)));
    let overlay = Arc::new(OverlayManager::new(fast_config(), Handle::current()));
    let overlay_node = root.attach(NodeId::ROOT, "overlay", overlay.clone()).unwrap();

    let r = Arc::clone(&root);
    run_blocking(move || r.start()).await;
    let r = Arc::clone(&root);
    run_blocking(move || r.stop()).await.unwrap();

    let err = overlay.add_session(&root, overlay_node.id()).unwrap_err();
    assert!(matches!(err, LifecycleError::ParentStopping { .. }));
    assert_eq!(overlay.session_count(), 0);
}

#[tokio::test]
async fn test_stop_flag_future_resolves_on_stop() {
    let root = Arc::new(RootNode::new("node", Arc::new(Passive)));
    let flag = root.stop_flag();
    let waiter = tokio::spawn(async move { flag.stopping().await });

    root.start();
    root.stop().unwrap();

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("stopping future did not resolve")
        .unwrap();
}

#[tokio::test]
async fn test_stop_off_current_thread_runtime_completes() {
    let root = Arc::new(RootNode::new("node", Arc::new(Passive)));
    let overlay = Arc::new(OverlayManager::new(fast_config(), Handle::current()));
    let overlay_node = root.attach(NodeId::ROOT, "overlay", overlay.clone()).unwrap();
    let session = overlay.add_session(&root, overlay_node.id()).unwrap();

    let r = Arc::clone(&root);
    run_blocking(move || r.start()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The runtime's only thread stays free to run the session's completion task.
    let r = Arc::clone(&root);
    run_blocking(move || r.stop()).await.unwrap();

    assert_eq!(session.state(), SessionState::ForceConcluded);
    assert!(overlay_node.is_stopped());
}
