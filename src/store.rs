//! Persisted broker record and its storage adapter
//!
//! The record is a small JSON document at a well-known path. Absence or
//! corruption of the record is the expected first-boot state, so `load`
//! always succeeds and falls back to defaults; only writes can fail, and a
//! failed write leaves the in-memory configuration authoritative until the
//! next reboot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum length of the broker address field, in characters
pub const MAX_ADDRESS_LEN: usize = 15;
/// Maximum length of the broker port field, in characters
pub const MAX_PORT_LEN: usize = 5;
/// Maximum length of the broker user and password fields, in characters
pub const MAX_CREDENTIAL_LEN: usize = 9;

/// Port used when the stored port text does not parse
pub const DEFAULT_PORT: u16 = 1883;

/// The persisted connection parameters.
///
/// `has_stored_broker` is true only once a non-empty broker address has been
/// captured and saved at least once; while it is false the record is
/// valid-but-inactive and no broker connection is ever attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerConfig {
    pub broker_address: String,
    /// Stored textually, parsed to an integer at use
    pub broker_port: String,
    pub broker_user: String,
    pub broker_pass: String,
    pub has_stored_broker: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            broker_address: String::new(),
            broker_port: DEFAULT_PORT.to_string(),
            broker_user: String::new(),
            broker_pass: String::new(),
            has_stored_broker: false,
        }
    }
}

impl BrokerConfig {
    /// Parse the stored port text, falling back to the default MQTT port
    pub fn port(&self) -> u16 {
        match self.broker_port.trim().parse() {
            Ok(port) => port,
            Err(_) => {
                warn!(
                    port = %self.broker_port,
                    fallback = DEFAULT_PORT,
                    "stored broker port does not parse"
                );
                DEFAULT_PORT
            }
        }
    }

    /// An active record always carries a non-empty address; anything else is
    /// demoted back to inactive on load.
    fn normalized(mut self) -> Self {
        if self.has_stored_broker && self.broker_address.is_empty() {
            warn!("stored record marks a broker but has no address, treating as unprovisioned");
            self.has_stored_broker = false;
        }
        self
    }
}

/// Storage write errors. Reads never fail, see [`ConfigStore::load`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write broker record: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to remove broker record: {0}")]
    Wipe(#[source] std::io::Error),
    #[error("failed to serialize broker record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and writes the broker record at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record. A missing file, unreadable storage, or
    /// malformed content all yield the all-defaults record.
    pub fn load(&self) -> BrokerConfig {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no broker record, first boot");
                return BrokerConfig::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "broker record unreadable");
                return BrokerConfig::default();
            }
        };

        match serde_json::from_slice::<BrokerConfig>(&bytes) {
            Ok(config) => config.normalized(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "broker record malformed");
                BrokerConfig::default()
            }
        }
    }

    /// Serialize and overwrite the record. The caller keeps its runtime copy
    /// regardless of the outcome; a write failure only costs persistence
    /// across the next reboot.
    pub fn save(&self, config: &BrokerConfig) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(config)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Write)?;
        }
        std::fs::write(&self.path, bytes).map_err(StoreError::Write)?;
        debug!(path = %self.path.display(), "broker record saved");
        Ok(())
    }

    /// Remove the record. Absence counts as success.
    pub fn wipe(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Wipe(err)),
        }
    }
}
