// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

mod common;

use common::{wait_for, Behavior, TestServer};
use session_client::config::ReconnectConfig;
use session_client::manager::{ConnectionManager, InboundFrame, LinkState};
use std::time::Duration;
use tokio::sync::mpsc;

fn reconnect(max_attempts: u32, interval_ms: u64) -> ReconnectConfig {
    ReconnectConfig {
        enabled: true,
        max_attempts,
        interval_ms,
    }
}

#[tokio::test]
async fn test_dropped_link_recovers_with_the_same_handler() {
    let server = TestServer::with_behavior(Behavior::DropFirst(1)).await;
    let manager = ConnectionManager::new(reconnect(5, 50));

    let (tx, mut rx) = mpsc::unbounded_channel();
    manager.on_message(move |frame| {
        let _ = tx.send(frame);
    });

    // the first connection opens, then the server hangs up on it
    manager.connect(&server.url()).await.expect("connect");

    let recovered = wait_for(Duration::from_secs(3), || {
        server.accepted() == 2 && manager.state() == LinkState::Open
    })
    .await;
    assert!(recovered, "link did not recover");
    // a successful reconnect restores the full budget
    assert_eq!(manager.reconnect_attempts(), 0);

    // the handler registered before the drop still receives traffic
    assert!(manager.send("still here"));
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("reply in time")
        .expect("reply");
    assert_eq!(frame, InboundFrame::Text("Echo: still here".to_string()));
    manager.close();
}

#[tokio::test]
async fn test_retry_budget_exhaustion_settles_closed() {
    let server = TestServer::spawn().await;
    let manager = ConnectionManager::new(reconnect(5, 50));

    manager.connect(&server.url()).await.expect("connect");
    assert_eq!(manager.state(), LinkState::Open);

    let lost_at = tokio::time::Instant::now();
    server.shutdown().await;

    let settled = wait_for(Duration::from_secs(5), || {
        manager.state() == LinkState::Closed
    })
    .await;
    assert!(settled, "manager never settled Closed");

    // five attempts, each preceded by the fixed delay
    assert_eq!(manager.reconnect_attempts(), 5);
    assert!(lost_at.elapsed() >= Duration::from_millis(5 * 50));

    // absolutely quiet afterwards
    assert!(!manager.send("into the void"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.state(), LinkState::Closed);
    assert_eq!(manager.reconnect_attempts(), 5);

    // only an explicit connect resumes, with a fresh budget
    let fallback = TestServer::spawn().await;
    manager.connect(&fallback.url()).await.expect("fresh connect");
    assert_eq!(manager.state(), LinkState::Open);
    assert_eq!(manager.reconnect_attempts(), 0);
    manager.close();
}

#[tokio::test]
async fn test_close_during_retry_delay_cancels_the_loop() {
    let server = TestServer::with_behavior(Behavior::DropFirst(usize::MAX)).await;
    let manager = ConnectionManager::new(reconnect(5, 500));

    manager.connect(&server.url()).await.expect("connect");

    // the server hangs up; the manager enters its retry delay
    let retrying = wait_for(Duration::from_secs(2), || {
        manager.state() == LinkState::Connecting
    })
    .await;
    assert!(retrying, "manager never started retrying");
    let accepted_before = server.accepted();

    manager.close();
    assert_eq!(manager.state(), LinkState::Closed);

    // the armed delay must not produce another dial
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(server.accepted(), accepted_before);
    assert_eq!(manager.state(), LinkState::Closed);
}

#[tokio::test]
async fn test_terminal_close_is_observable() {
    let server = TestServer::spawn().await;
    let manager = ConnectionManager::new(reconnect(2, 50));
    let mut states = manager.state_changes();

    manager.connect(&server.url()).await.expect("connect");
    server.shutdown().await;

    let saw_closed = tokio::time::timeout(Duration::from_secs(3), async {
        while states.changed().await.is_ok() {
            if *states.borrow() == LinkState::Closed {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(saw_closed, "Closed was never published");
}
