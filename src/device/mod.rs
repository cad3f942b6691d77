//! Physical-surface adapters
//!
//! Thin wrappers around the device's sysfs surfaces: the WiFi link state,
//! the status LED, and the factory-reset button. Each adapter is a
//! non-blocking tick participant; none of them make decisions beyond their
//! own surface.

pub mod indicator;
pub mod link;
pub mod reset;

pub use indicator::{StatusIndicator, SysfsLed};
pub use link::{LinkError, NetworkLink, WlanLink};
pub use reset::{GpioButton, ResetInput, ResetWatcher};
