//! Crate-level error type
//!
//! Collects the per-module error enums behind a single conversion point for
//! the binary and the runtime.

use thiserror::Error;

/// Top-level error for supervisor operations
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("settings error: {0}")]
    Settings(#[from] crate::config::SettingsError),

    #[error("storage error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("provisioning portal error: {0}")]
    Portal(#[from] crate::provisioning::PortalError),

    #[error("messaging client error: {0}")]
    Client(#[from] crate::transport::ClientError),

    #[error("failed to render settings: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for supervisor operations
pub type UplinkResult<T> = Result<T, UplinkError>;
