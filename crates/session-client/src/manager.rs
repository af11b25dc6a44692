// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

//! Single-connection transport ownership: one WebSocket at a time, an
//! inbound handler that survives reconnects, and a fixed-interval retry
//! loop driven by [`ReconnectPolicy`].

use futures::{SinkExt, StreamExt};
use session_core::{AuthFrame, Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::reconnect::ReconnectPolicy;
use crate::store::CredentialStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Handler = Box<dyn FnMut(InboundFrame) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

struct Shared {
    reconnect: ReconnectConfig,
    credentials: Option<CredentialStore>,
    url: Mutex<Option<String>>,
    state: watch::Sender<LinkState>,
    handler: Mutex<Option<Handler>>,
    outbound: Mutex<Option<(u64, mpsc::UnboundedSender<String>)>>,
    pump_seq: AtomicU64,
    // generation guard: a newer connect() invalidates older driver tasks
    epoch: AtomicU64,
    alive: AtomicBool,
    attempts: AtomicU32,
}

/// Owns at most one live transport. Cloning shares the same link, so
/// feature code can hold a handle wherever it needs one.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self::build(reconnect, None)
    }

    /// A manager that authenticates each freshly opened transport with
    /// the store's credential as the first frame.
    pub fn with_credentials(reconnect: ReconnectConfig, credentials: CredentialStore) -> Self {
        Self::build(reconnect, Some(credentials))
    }

    fn build(reconnect: ReconnectConfig, credentials: Option<CredentialStore>) -> Self {
        let (state, _) = watch::channel(LinkState::Idle);
        Self {
            shared: Arc::new(Shared {
                reconnect,
                credentials,
                url: Mutex::new(None),
                state,
                handler: Mutex::new(None),
                outbound: Mutex::new(None),
                pump_seq: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                alive: AtomicBool::new(false),
                attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Opens the link. A no-op while already Open or Connecting. A
    /// handshake failure is returned to this caller only; the retry loop
    /// never runs for an initial attempt that was never open.
    pub async fn connect(&self, url: &str) -> Result<()> {
        let started = self.shared.state.send_if_modified(|state| match state {
            LinkState::Open | LinkState::Connecting | LinkState::Closing => false,
            LinkState::Idle | LinkState::Closed => {
                *state = LinkState::Connecting;
                true
            }
        });
        if !started {
            return Ok(());
        }

        self.shared.alive.store(true, Ordering::SeqCst);
        self.shared.attempts.store(0, Ordering::SeqCst);
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.url.lock().unwrap() = Some(url.to_string());

        match dial(&self.shared).await {
            Ok(socket) => {
                if self.shared.epoch.load(Ordering::SeqCst) != epoch
                    || !self.shared.alive.load(Ordering::SeqCst)
                {
                    // closed or superseded while the handshake was in
                    // flight; the socket is abandoned
                    return Ok(());
                }
                info!("connected to {}", url);
                set_state(&self.shared, LinkState::Open);
                tokio::spawn(drive(self.shared.clone(), socket, epoch));
                Ok(())
            }
            Err(e) => {
                if self.shared.epoch.load(Ordering::SeqCst) == epoch
                    && self.shared.alive.load(Ordering::SeqCst)
                {
                    set_state(&self.shared, LinkState::Idle);
                }
                Err(e)
            }
        }
    }

    /// Hands the payload to the transport iff the link is Open. `false`
    /// means dropped; callers resend later, nothing is raised.
    pub fn send(&self, payload: &str) -> bool {
        if *self.shared.state.borrow() != LinkState::Open {
            return false;
        }
        match self.shared.outbound.lock().unwrap().as_ref() {
            Some((_, tx)) => tx.send(payload.to_string()).is_ok(),
            None => false,
        }
    }

    /// Registers the inbound handler, replacing any previous one. The
    /// binding belongs to the manager, so it survives reconnects.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(InboundFrame) + Send + 'static,
    {
        *self.shared.handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Shuts the link down and disables the retry loop. Idempotent; a
    /// later `connect` starts over with a fresh retry budget.
    pub fn close(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        // dropping the sender tells the pump to send a close frame
        let had_link = self.shared.outbound.lock().unwrap().take().is_some();
        self.shared.state.send_if_modified(|state| match state {
            LinkState::Closed => false,
            _ => {
                *state = if had_link {
                    LinkState::Closing
                } else {
                    LinkState::Closed
                };
                true
            }
        });
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state.borrow()
    }

    /// Watch the link lifecycle, including the terminal Closed once the
    /// retry budget is exhausted.
    pub fn state_changes(&self) -> watch::Receiver<LinkState> {
        self.shared.state.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

async fn dial(shared: &Shared) -> Result<WsStream> {
    let url = shared
        .url
        .lock()
        .unwrap()
        .clone()
        .ok_or_else(|| Error::Connection("no target address".to_string()))?;

    let (mut socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::Connection(format!("handshake failed: {}", e)))?;

    if let Some(store) = &shared.credentials {
        // blocks (bounded by the store's wait timeout) when connecting
        // races ahead of login
        match store.get().await {
            Some(token) => {
                let frame = AuthFrame::new(token).to_text()?;
                socket
                    .send(Message::Text(frame))
                    .await
                    .map_err(|e| Error::Connection(format!("auth frame failed: {}", e)))?;
            }
            None => warn!("no credential available, connecting unauthenticated"),
        }
    }

    Ok(socket)
}

async fn drive(shared: Arc<Shared>, socket: WsStream, epoch: u64) {
    let mut policy = ReconnectPolicy::from_config(&shared.reconnect);
    let mut socket = Some(socket);

    loop {
        if let Some(active) = socket.take() {
            pump(&shared, active).await;
        }

        if shared.epoch.load(Ordering::SeqCst) != epoch {
            // a newer connect() owns the manager now
            return;
        }
        if !shared.alive.load(Ordering::SeqCst) {
            set_state(&shared, LinkState::Closed);
            return;
        }

        let Some(delay) = policy.next_delay() else {
            warn!("retry budget exhausted, closing link");
            shared.alive.store(false, Ordering::SeqCst);
            set_state(&shared, LinkState::Closed);
            return;
        };
        shared.attempts.store(policy.attempt(), Ordering::SeqCst);
        set_state(&shared, LinkState::Connecting);
        info!(
            "connection lost, reconnect attempt {} in {:?}",
            policy.attempt(),
            delay
        );
        sleep(delay).await;

        if shared.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        if !shared.alive.load(Ordering::SeqCst) {
            set_state(&shared, LinkState::Closed);
            return;
        }

        match dial(&shared).await {
            Ok(reopened) => {
                policy.reset();
                shared.attempts.store(0, Ordering::SeqCst);
                set_state(&shared, LinkState::Open);
                info!("reconnected");
                socket = Some(reopened);
            }
            Err(e) => warn!("reconnect attempt failed: {}", e),
        }
    }
}

async fn pump(shared: &Arc<Shared>, socket: WsStream) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let pump_id = shared.pump_seq.fetch_add(1, Ordering::SeqCst);
    *shared.outbound.lock().unwrap() = Some((pump_id, tx));

    loop {
        tokio::select! {
            queued = rx.recv() => match queued {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        debug!("write failed: {}", e);
                        break;
                    }
                }
                None => {
                    // close() dropped the sender: part gracefully
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => deliver(shared, InboundFrame::Text(text)),
                Some(Ok(Message::Binary(data))) => deliver(shared, InboundFrame::Binary(data)),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("read failed: {}", e);
                    break;
                }
            },
        }
    }

    let mut outbound = shared.outbound.lock().unwrap();
    if outbound.as_ref().is_some_and(|(id, _)| *id == pump_id) {
        *outbound = None;
    }
}

fn deliver(shared: &Shared, frame: InboundFrame) {
    let mut handler = shared.handler.lock().unwrap();
    match handler.as_mut() {
        Some(handler) => handler(frame),
        None => debug!("inbound frame dropped, no handler registered"),
    }
}

fn set_state(shared: &Shared, new: LinkState) {
    shared.state.send_if_modified(|state| {
        if *state == new {
            false
        } else {
            *state = new;
            true
        }
    });
}
