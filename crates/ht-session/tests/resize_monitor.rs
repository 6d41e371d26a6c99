//! Window size propagation tests
//!
//! These run on a paused clock so retry delays and poll intervals elapse
//! instantly and deterministically.

mod common;

use std::time::Duration;

use common::{FakeEngine, FakeTerminal};
use ht_core::{TargetId, TargetKind, TerminalSize};
use ht_session::resize::{ResizeMonitor, WatchMode, BOOTSTRAP_RETRIES};
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(250);

#[tokio::test(start_paused = true)]
async fn test_initial_size_is_sent_once() {
    let (engine, _remotes) = FakeEngine::new();
    let terminal = FakeTerminal::new(TerminalSize::new(40, 120));
    let cancel = CancellationToken::new();

    let handle = ResizeMonitor::new(
        engine.clone(),
        TargetId::new("t1"),
        TargetKind::Container,
        terminal,
    )
    .spawn(WatchMode::Poll(POLL), false, cancel.clone());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.resize_sizes(), vec![TerminalSize::new(40, 120)]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poll_picks_up_changes() {
    let (engine, _remotes) = FakeEngine::new();
    let terminal = FakeTerminal::new(TerminalSize::new(24, 80));
    let cancel = CancellationToken::new();

    ResizeMonitor::new(
        engine.clone(),
        TargetId::new("t1"),
        TargetKind::Exec,
        terminal.clone(),
    )
    .spawn(WatchMode::Poll(POLL), false, cancel.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    terminal.set_size(TerminalSize::new(30, 100));
    tokio::time::sleep(POLL * 2).await;

    assert_eq!(
        engine.resize_sizes(),
        vec![TerminalSize::new(24, 80), TerminalSize::new(30, 100)]
    );
    assert!(engine
        .resizes
        .lock()
        .unwrap()
        .iter()
        .all(|(_, kind)| *kind == TargetKind::Exec));
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_gives_up_then_watch_continues() {
    let (engine, _remotes) = FakeEngine::new();
    // The initial attempt and every retry fail
    let attempts = 1 + BOOTSTRAP_RETRIES;
    engine.fail_resizes(attempts);
    let terminal = FakeTerminal::new(TerminalSize::new(24, 80));
    let cancel = CancellationToken::new();

    ResizeMonitor::new(
        engine.clone(),
        TargetId::new("t1"),
        TargetKind::Container,
        terminal.clone(),
    )
    .spawn(WatchMode::Poll(POLL), false, cancel.clone());

    // Retries are spaced well inside one poll interval
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.resize_sizes().len(), attempts);

    // Unchanged size is not retried by the watch loop
    tokio::time::sleep(POLL * 2).await;
    assert_eq!(engine.resize_sizes().len(), attempts);

    terminal.set_size(TerminalSize::new(50, 132));
    tokio::time::sleep(POLL * 2).await;
    let sizes = engine.resize_sizes();
    assert_eq!(sizes.len(), attempts + 1);
    assert_eq!(sizes.last(), Some(&TerminalSize::new(50, 132)));
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_retry_recovers() {
    let (engine, _remotes) = FakeEngine::new();
    engine.fail_resizes(2);
    let terminal = FakeTerminal::new(TerminalSize::new(24, 80));
    let cancel = CancellationToken::new();

    ResizeMonitor::new(
        engine.clone(),
        TargetId::new("t1"),
        TargetKind::Container,
        terminal,
    )
    .spawn(WatchMode::Poll(POLL), false, cancel.clone());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(engine.resize_sizes().len(), 3);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_redraw_nudges_with_larger_size_first() {
    let (engine, _remotes) = FakeEngine::new();
    let terminal = FakeTerminal::new(TerminalSize::new(24, 80));
    let cancel = CancellationToken::new();

    ResizeMonitor::new(
        engine.clone(),
        TargetId::new("t1"),
        TargetKind::Container,
        terminal,
    )
    .spawn(WatchMode::Poll(POLL), true, cancel.clone());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        engine.resize_sizes(),
        vec![TerminalSize::new(25, 81), TerminalSize::new(24, 80)]
    );
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_zero_size_is_never_sent() {
    let (engine, _remotes) = FakeEngine::new();
    let terminal = FakeTerminal::new(TerminalSize::new(0, 0));
    let cancel = CancellationToken::new();

    ResizeMonitor::new(
        engine.clone(),
        TargetId::new("t1"),
        TargetKind::Container,
        terminal,
    )
    .spawn(WatchMode::Poll(POLL), false, cancel.clone());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(engine.resize_sizes().is_empty());
    cancel.cancel();
}
