// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_handshake")]
    pub handshake: bool,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./session")
}

fn default_wait_timeout() -> u64 {
    1000
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_interval() -> u64 {
    3000
}

fn default_handshake() -> bool {
    true
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SERVER_URL") {
            self.server.url = val;
        }
        if let Ok(val) = env::var("SESSION_STORAGE_DIR") {
            self.session.storage_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("SESSION_WAIT_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.session.wait_timeout_ms = timeout;
            }
        }
        if let Ok(val) = env::var("RECONNECT_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.reconnect.enabled = enabled;
            }
        }
        if let Ok(val) = env::var("RECONNECT_MAX_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                self.reconnect.max_attempts = attempts;
            }
        }
        if let Ok(val) = env::var("RECONNECT_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                self.reconnect.interval_ms = interval;
            }
        }
        if let Ok(val) = env::var("AUTH_HANDSHAKE") {
            if let Ok(handshake) = val.parse() {
                self.auth.handshake = handshake;
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server.url.is_empty() {
            anyhow::bail!("SERVER_URL is required");
        }
        if !self.server.url.starts_with("ws://") && !self.server.url.starts_with("wss://") {
            anyhow::bail!("SERVER_URL must be a ws:// or wss:// address");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { url: String::new() },
            session: SessionConfig::default(),
            reconnect: ReconnectConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            wait_timeout_ms: default_wait_timeout(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            max_attempts: default_max_attempts(),
            interval_ms: default_interval(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            handshake: default_handshake(),
        }
    }
}
