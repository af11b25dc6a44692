// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use super::tier::PersistenceTier;
use tracing::debug;

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";

/// Ephemeral-first composition of two tiers. A durable hit is migrated
/// into the ephemeral tier and deleted from durable, so a rotated value
/// in one context never coexists with a stale durable copy seen by
/// another.
pub struct TieredStore {
    ephemeral: Box<dyn PersistenceTier>,
    durable: Box<dyn PersistenceTier>,
}

impl TieredStore {
    pub fn new(ephemeral: Box<dyn PersistenceTier>, durable: Box<dyn PersistenceTier>) -> Self {
        Self { ephemeral, durable }
    }

    pub fn load(&mut self, key: &str) -> Option<String> {
        if let Some(value) = self.ephemeral.load(key) {
            return Some(value);
        }
        let value = self.durable.load(key)?;
        debug!("migrating {} from durable tier", key);
        self.ephemeral.store(key, &value);
        self.durable.remove(key);
        Some(value)
    }

    /// Writes target the ephemeral tier; any durable copy is stale by
    /// definition and removed.
    pub fn store(&mut self, key: &str, value: &str) {
        self.ephemeral.store(key, value);
        self.durable.remove(key);
    }

    pub fn remove(&mut self, key: &str) {
        self.ephemeral.remove(key);
        self.durable.remove(key);
    }

    /// Non-migrating presence probe.
    pub fn contains(&self, key: &str) -> bool {
        self.ephemeral.load(key).is_some() || self.durable.load(key).is_some()
    }
}
