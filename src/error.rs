//! Error taxonomy for the input subsystem.
//!
//! Nothing here is fatal to the host. Most variants are logged and swallowed at
//! the point they occur; only configuration loading returns them to the caller.

use crate::event::{Cookie, RawHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    /// The platform device-manager session could not be opened.
    ///
    /// The catalog degrades to "no devices" when this happens.
    #[error("failed to open platform input session: {0}")]
    PlatformInit(String),

    /// A device's element descriptor is malformed; the device is skipped.
    #[error("malformed descriptor for device {handle}: {reason}")]
    Descriptor { handle: RawHandle, reason: String },

    /// The event queue exceeded its capacity and was cleared.
    #[error("event queue overflow, {dropped} event(s) dropped")]
    QueueOverflow { dropped: usize },

    /// A raw element handle has no entry in the device's cookie map.
    #[error("unknown element {cookie} on device {handle}")]
    UnknownElement { handle: RawHandle, cookie: Cookie },

    /// The platform refused to open a device handle.
    #[error("failed to open device {handle}: {reason}")]
    DeviceOpen { handle: RawHandle, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<toml::de::Error> for InputError {
    fn from(e: toml::de::Error) -> Self {
        InputError::Config(e.to_string())
    }
}

impl From<std::io::Error> for InputError {
    fn from(e: std::io::Error) -> Self {
        InputError::Config(e.to_string())
    }
}

#[cfg(feature = "hid")]
impl From<hidapi::HidError> for InputError {
    fn from(e: hidapi::HidError) -> Self {
        InputError::PlatformInit(e.to_string())
    }
}
