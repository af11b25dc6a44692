// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// How the in-process server treats incoming connections.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Record text frames and answer each with `Echo: <text>`.
    Echo,
    /// Hang up right after the handshake for the first `n` connections,
    /// then behave like `Echo`.
    DropFirst(usize),
}

/// Minimal in-process WebSocket endpoint for driving the client.
pub struct TestServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    acceptor: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::with_behavior(Behavior::Echo).await
    }

    pub async fn with_behavior(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let received = Arc::new(Mutex::new(Vec::new()));
        let accepted = Arc::new(AtomicUsize::new(0));
        let tasks: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let acceptor = tokio::spawn({
            let received = received.clone();
            let accepted = accepted.clone();
            let tasks = tasks.clone();
            async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let n = accepted.fetch_add(1, Ordering::SeqCst);
                    let drop_now = matches!(behavior, Behavior::DropFirst(k) if n < k);
                    let received = received.clone();
                    let task = tokio::spawn(async move {
                        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                            return;
                        };
                        if drop_now {
                            // dropping the socket is the hangup
                            return;
                        }
                        while let Some(Ok(msg)) = ws.next().await {
                            match msg {
                                Message::Text(text) => {
                                    received.lock().await.push(text.clone());
                                    let reply = format!("Echo: {}", text);
                                    if ws.send(Message::Text(reply)).await.is_err() {
                                        break;
                                    }
                                }
                                Message::Binary(data) => {
                                    if ws.send(Message::Binary(data)).await.is_err() {
                                        break;
                                    }
                                }
                                Message::Close(_) => break,
                                _ => {}
                            }
                        }
                    });
                    tasks.lock().await.push(task);
                }
            }
        });

        Self {
            addr,
            received,
            accepted,
            tasks,
            acceptor,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Connections accepted so far, including dropped ones.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// Stops listening and severs every live connection. Subsequent
    /// dials to `url()` are refused.
    pub async fn shutdown(&self) {
        self.acceptor.abort();
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }
}

/// Polls `predicate` until it holds or `deadline` passes.
pub async fn wait_for<F>(deadline: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Waits until the server has recorded at least `count` text frames and
/// returns them. Panics once `deadline` passes.
pub async fn wait_for_frames(server: &TestServer, count: usize, deadline: Duration) -> Vec<String> {
    let start = tokio::time::Instant::now();
    loop {
        let frames = server.received().await;
        if frames.len() >= count {
            return frames;
        }
        assert!(
            start.elapsed() < deadline,
            "server saw {} frame(s), expected {}",
            frames.len(),
            count
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
