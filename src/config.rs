//! Operator settings
//!
//! Settings describe the device itself: its name, where the broker record is
//! persisted, which WiFi interface carries the link, and the physical
//! surfaces (LED, reset button, provisioning portal). They are loaded once at
//! startup from a TOML file; every field has a default so the file is
//! optional. The broker connection parameters are NOT part of the settings -
//! they are captured through the provisioning portal and live in
//! [`crate::store::BrokerConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default locations probed when no settings file is given on the CLI
const DEFAULT_LOCATIONS: &[&str] = &["uplink.toml", "/etc/uplink/uplink.toml"];

/// Top-level settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub device: DeviceSection,
    pub portal: PortalSection,
    pub storage: StorageSection,
    pub link: LinkSection,
    pub indicator: IndicatorSection,
    pub reset: ResetSection,
}

/// Device identity and scheduler cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSection {
    /// Device name, used as the MQTT client id, the access-point SSID, and
    /// the topic namespace (must match [a-zA-Z0-9._-]+)
    pub name: String,
    /// Cooperative scheduler tick interval in milliseconds
    pub tick_ms: u64,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name: "uplink".to_string(),
            tick_ms: 25,
        }
    }
}

impl DeviceSection {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Provisioning portal surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortalSection {
    /// Listen address for the provisioning form
    pub listen: String,
    /// Passphrase protecting the provisioning access point
    pub passphrase: String,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            passphrase: "uplink-setup".to_string(),
        }
    }
}

/// Persistent storage locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSection {
    /// Path of the persisted broker record
    pub config_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/var/lib/uplink/broker.json"),
        }
    }
}

/// WiFi link layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkSection {
    /// Network interface carrying the uplink
    pub interface: String,
    /// Path of the stored WiFi credentials handed to the platform's
    /// network daemon
    pub credentials_path: PathBuf,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            credentials_path: PathBuf::from("/etc/uplink/wifi.conf"),
        }
    }
}

/// Status LED surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorSection {
    /// sysfs brightness file of the status LED
    pub led_path: PathBuf,
}

impl Default for IndicatorSection {
    fn default() -> Self {
        Self {
            led_path: PathBuf::from("/sys/class/leds/uplink:status/brightness"),
        }
    }
}

/// Factory-reset button surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResetSection {
    /// sysfs value file of the reset button input
    pub input_path: PathBuf,
    /// The input reads 0 when pressed
    pub active_low: bool,
    /// Hold duration required to trigger a factory reset, in milliseconds
    pub hold_ms: u64,
}

impl Default for ResetSection {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("/sys/class/gpio/gpio0/value"),
            active_low: true,
            hold_ms: 5000,
        }
    }
}

impl ResetSection {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

/// Settings loading errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid device name: {0}")]
    InvalidDeviceName(String),
}

impl Settings {
    /// Load settings from an explicit file, or probe the default locations.
    /// A missing file is the expected first-boot state and yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => {
                info!(path = %path.display(), "loading settings");
                Self::load_from_file(path)
            }
            None => {
                for candidate in DEFAULT_LOCATIONS {
                    let candidate = Path::new(candidate);
                    if candidate.exists() {
                        info!(path = %candidate.display(), "loading settings");
                        return Self::load_from_file(candidate);
                    }
                }
                info!("no settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate settings from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        validate_device_name(&settings.device.name)?;
        Ok(settings)
    }
}

/// Device names end up in MQTT client ids and topic paths, so the character
/// set is restricted the same way on both surfaces.
fn validate_device_name(name: &str) -> Result<(), SettingsError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(SettingsError::InvalidDeviceName(format!(
            "'{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.device.name, "uplink");
        assert_eq!(settings.device.tick(), Duration::from_millis(25));
        assert_eq!(settings.reset.hold(), Duration::from_millis(5000));
        assert!(settings.reset.active_low);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let toml_content = r#"
[device]
name = "garden-node"

[reset]
hold_ms = 3000
"#;
        let settings: Settings = toml::from_str(toml_content).unwrap();
        assert_eq!(settings.device.name, "garden-node");
        assert_eq!(settings.reset.hold_ms, 3000);
        // untouched sections keep their defaults
        assert_eq!(settings.portal.listen, "0.0.0.0:8080");
        assert_eq!(settings.link.interface, "wlan0");
    }

    #[test]
    fn test_invalid_device_name() {
        assert!(validate_device_name("garden node").is_err());
        assert!(validate_device_name("").is_err());
        assert!(validate_device_name("valid-device_123.test").is_ok());
    }

    #[test]
    fn test_load_rejects_bad_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uplink.toml");
        std::fs::write(&path, "[device]\nname = \"bad name\"\n").unwrap();
        let result = Settings::load_from_file(&path);
        assert!(matches!(result, Err(SettingsError::InvalidDeviceName(_))));
    }
}
