//! WiFi link-layer adapter
//!
//! Link state is the interface's operstate, independent of any broker
//! session. Credentials are handed to the platform's network daemon through
//! a file it watches; joining and forgetting networks is therefore just
//! file management here.

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("wifi credential store: {0}")]
    Credentials(#[source] std::io::Error),
}

/// Link-layer collaborator
pub trait NetworkLink: Send {
    /// Whether the link layer is currently associated
    fn is_up(&self) -> bool;

    /// Hand new credentials to the network daemon (best effort; association
    /// happens asynchronously outside this process)
    fn join(&self, ssid: &str, psk: &str) -> Result<(), LinkError>;

    /// Remove stored credentials so the device boots unassociated
    fn forget_credentials(&self) -> Result<(), LinkError>;
}

/// sysfs-backed adapter for a wireless interface
pub struct WlanLink {
    operstate_path: PathBuf,
    credentials_path: PathBuf,
}

impl WlanLink {
    pub fn new(interface: &str, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            operstate_path: PathBuf::from(format!("/sys/class/net/{interface}/operstate")),
            credentials_path: credentials_path.into(),
        }
    }
}

impl NetworkLink for WlanLink {
    fn is_up(&self) -> bool {
        match std::fs::read_to_string(&self.operstate_path) {
            Ok(state) => state.trim() == "up",
            Err(err) => {
                // a missing interface reads as link-down, not as an error
                debug!(path = %self.operstate_path.display(), error = %err, "operstate unreadable");
                false
            }
        }
    }

    fn join(&self, ssid: &str, psk: &str) -> Result<(), LinkError> {
        if let Some(parent) = self.credentials_path.parent() {
            std::fs::create_dir_all(parent).map_err(LinkError::Credentials)?;
        }
        let content = format!("ssid={ssid}\npsk={psk}\n");
        std::fs::write(&self.credentials_path, content).map_err(LinkError::Credentials)?;
        info!(ssid = %ssid, "wifi credentials handed to network daemon");
        Ok(())
    }

    fn forget_credentials(&self) -> Result<(), LinkError> {
        match std::fs::remove_file(&self.credentials_path) {
            Ok(()) => {
                info!("wifi credentials cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(LinkError::Credentials(err)),
        }
    }
}
