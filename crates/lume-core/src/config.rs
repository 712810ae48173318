//! Configuration system for Lume.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LUME_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lume/config.toml
//!   3. ~/.config/lume/config.toml

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use crate::identity::{IdentityError, LocalIdentity};
use crate::wire::{BEACON_INTERVAL_SECS, DISCOVERY_PORT, OFFER_TIMEOUT_SECS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LumeConfig {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
}

/// Saved profile. Both fields must be set for the profile to be usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Display name, 1..=31 bytes.
    pub username: String,
    /// TCP listening port. 0 = not configured.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP port beacons are received on.
    pub discovery_port: u16,
    /// Destination of outgoing beacons.
    pub broadcast_addr: SocketAddrV4,
    pub beacon_interval_secs: u64,
    /// Bound on outbound TCP connects.
    pub connect_timeout_secs: u64,
    /// How long a file sender waits for accept/reject. 0 = wait indefinitely.
    pub reply_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Where accepted files are written.
    pub download_dir: PathBuf,
    /// How long an inbound offer waits for /accept or /reject.
    pub offer_timeout_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: DISCOVERY_PORT,
            broadcast_addr: SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT),
            beacon_interval_secs: BEACON_INTERVAL_SECS,
            connect_timeout_secs: 10,
            // Receiver's decision window plus a grace period.
            reply_timeout_secs: OFFER_TIMEOUT_SECS + 5,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            offer_timeout_secs: OFFER_TIMEOUT_SECS,
        }
    }
}

impl NetworkConfig {
    pub fn beacon_interval(&self) -> Duration {
        Duration::from_secs(self.beacon_interval_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_secs > 0).then(|| Duration::from_secs(self.reply_timeout_secs))
    }
}

impl TransferConfig {
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_secs(self.offer_timeout_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("lume")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LumeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a specific file, falling back to defaults when it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(LumeConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LUME_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write this config to [`LumeConfig::file_path`], creating parent directories.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// The saved profile as a validated identity.
    pub fn identity(&self) -> Result<LocalIdentity, IdentityError> {
        LocalIdentity::new(&self.identity.username, self.identity.port)
    }

    /// Apply LUME_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LUME_IDENTITY__USERNAME") {
            self.identity.username = v;
        }
        if let Ok(v) = std::env::var("LUME_IDENTITY__PORT") {
            if let Ok(p) = v.parse() {
                self.identity.port = p;
            }
        }
        if let Ok(v) = std::env::var("LUME_NETWORK__DISCOVERY_PORT") {
            if let Ok(p) = v.parse() {
                self.network.discovery_port = p;
            }
        }
        if let Ok(v) = std::env::var("LUME_NETWORK__BROADCAST_ADDR") {
            match v.parse() {
                Ok(addr) => self.network.broadcast_addr = addr,
                Err(_) => tracing::warn!(value = %v, "ignoring unparsable LUME_NETWORK__BROADCAST_ADDR"),
            }
        }
        if let Ok(v) = std::env::var("LUME_TRANSFER__DOWNLOAD_DIR") {
            self.transfer.download_dir = PathBuf::from(v);
        }
    }
}
