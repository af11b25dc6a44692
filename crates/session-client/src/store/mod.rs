// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

//! Session credential authority. One live value, two storage tiers, and a
//! waiter queue for callers that ask before the login flow has delivered.

pub mod tier;
pub mod tiered;

use session_core::Credential;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use tier::{FileTier, MemoryTier};
use tiered::{TieredStore, TOKEN_KEY, USERNAME_KEY};

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

type Waiter = (Uuid, oneshot::Sender<String>);

struct StoreState {
    current: Option<Credential>,
    tiers: TieredStore,
    waiters: VecDeque<Waiter>,
}

struct Inner {
    state: Mutex<StoreState>,
    wait_timeout: Duration,
}

/// Cheap-to-clone handle on the single credential authority. All clones
/// share one value, one tier stack and one waiter queue.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

impl CredentialStore {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        let tiers = TieredStore::new(
            Box::new(MemoryTier::new()),
            Box::new(FileTier::new(storage_dir)),
        );
        Self::with_store(tiers, DEFAULT_WAIT_TIMEOUT)
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let tiers = TieredStore::new(
            Box::new(MemoryTier::new()),
            Box::new(FileTier::new(config.storage_dir.clone())),
        );
        Self::with_store(tiers, Duration::from_millis(config.wait_timeout_ms))
    }

    pub fn with_store(tiers: TieredStore, wait_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState {
                    current: None,
                    tiers,
                    waiters: VecDeque::new(),
                }),
                wait_timeout,
            }),
        }
    }

    /// Installs a new credential, superseding any previous one, and
    /// resolves every queued waiter with the new token in arrival order.
    pub fn set(&self, token: &str, username: Option<&str>) {
        let mut state = self.inner.state.lock().unwrap();

        state.tiers.store(TOKEN_KEY, token);
        match username {
            Some(name) => state.tiers.store(USERNAME_KEY, name),
            // a stale hint must not outlive the credential it described
            None => state.tiers.remove(USERNAME_KEY),
        }
        state.current = Some(Credential::new(token, username.map(str::to_owned)));

        let waiters = std::mem::take(&mut state.waiters);
        let resolved = waiters.len();
        for (_, sender) in waiters {
            let _ = sender.send(token.to_string());
        }
        if resolved > 0 {
            debug!("credential set, {} waiter(s) resolved", resolved);
        }
    }

    /// Current token, from memory or a storage tier. With neither
    /// available the caller joins the waiter queue and gets the next
    /// `set` value, or `None` once the wait timeout elapses.
    pub async fn get(&self) -> Option<String> {
        let (waiter_id, mut rx) = {
            let mut state = self.inner.state.lock().unwrap();

            if let Some(cred) = &state.current {
                return Some(cred.token.clone());
            }
            if let Some(token) = state.tiers.load(TOKEN_KEY) {
                let username = state.tiers.load(USERNAME_KEY);
                state.current = Some(Credential::new(token.clone(), username));
                return Some(token);
            }

            let (tx, rx) = oneshot::channel();
            let waiter_id = Uuid::new_v4();
            state.waiters.push_back((waiter_id, tx));
            (waiter_id, rx)
        };

        match tokio::time::timeout(self.inner.wait_timeout, &mut rx).await {
            Ok(Ok(token)) => Some(token),
            Ok(Err(_)) => None,
            Err(_) => {
                let mut state = self.inner.state.lock().unwrap();
                if let Some(pos) = state.waiters.iter().position(|(id, _)| *id == waiter_id) {
                    // timed out first: leave the queue, resolve absent
                    state.waiters.remove(pos);
                    None
                } else {
                    // a concurrent set already drained this waiter; the
                    // token is sitting in the channel
                    drop(state);
                    rx.try_recv().ok()
                }
            }
        }
    }

    /// Forgets the credential everywhere. Queued waiters are unaffected
    /// and keep waiting for a future `set` or their own timeout.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.tiers.remove(TOKEN_KEY);
        state.tiers.remove(USERNAME_KEY);
        state.current = None;
        debug!("credential cleared");
    }

    /// Subject id decoded from the current token's claims segment.
    /// Absence and malformed tokens both read as `None`.
    pub fn current_identity(&self) -> Option<u64> {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(cred) = &state.current {
            return cred.subject();
        }
        let token = state.tiers.load(TOKEN_KEY)?;
        let username = state.tiers.load(USERNAME_KEY);
        state.current = Some(Credential::new(token, username));
        state.current.as_ref().and_then(Credential::subject)
    }

    /// Identity hint stored alongside the token.
    pub fn username(&self) -> Option<String> {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(name) = state.current.as_ref().and_then(|c| c.username.clone()) {
            return Some(name);
        }
        state.tiers.load(USERNAME_KEY)
    }

    /// Best-effort synchronous check: does any scope currently hold a
    /// token? Never consults or drains the waiter queue.
    pub fn is_authenticated(&self) -> bool {
        let state = self.inner.state.lock().unwrap();
        state.current.is_some() || state.tiers.contains(TOKEN_KEY)
    }

    pub fn waiting(&self) -> usize {
        self.inner.state.lock().unwrap().waiters.len()
    }
}
