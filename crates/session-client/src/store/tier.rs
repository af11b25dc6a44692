// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// One storage scope for session slots. Tier failures never propagate:
/// a read that fails is a miss, a write that fails reports `false`.
pub trait PersistenceTier: Send {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&mut self, key: &str, value: &str) -> bool;
    fn remove(&mut self, key: &str);
}

/// Scoped to this execution context only, gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTier {
    slots: HashMap<String, String>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceTier for MemoryTier {
    fn load(&self, key: &str) -> Option<String> {
        self.slots.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &str) -> bool {
        self.slots.insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&mut self, key: &str) {
        self.slots.remove(key);
    }
}

/// Shared across execution contexts through the filesystem, one file per
/// slot under `root`. Kept as the legacy fallback scope.
#[derive(Debug)]
pub struct FileTier {
    root: PathBuf,
}

impl FileTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl PersistenceTier for FileTier {
    fn load(&self, key: &str) -> Option<String> {
        match std::fs::read_to_string(self.slot_path(key)) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!("durable tier read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn store(&mut self, key: &str, value: &str) -> bool {
        if let Err(e) = std::fs::create_dir_all(&self.root) {
            debug!("durable tier unavailable: {}", e);
            return false;
        }
        match std::fs::write(self.slot_path(key), value) {
            Ok(()) => true,
            Err(e) => {
                debug!("durable tier write failed for {}: {}", key, e);
                false
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if let Err(e) = std::fs::remove_file(self.slot_path(key)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("durable tier remove failed for {}: {}", key, e);
            }
        }
    }
}
