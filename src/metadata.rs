//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of a device suitable
//! for logging and diagnostics. Backends populate what they know; unknown
//! optional fields remain `None`.
//!
//! - `vendor_id`/`product_id` are always present (zero when the platform does not say).
//! - `product_string` should be the user-facing name when available.
//! - `path` is an OS/topology path (opaque string). It may change across ports and
//!   reconnects; treat it as diagnostic first, identity second.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// USB Vendor ID (VID).
    pub vendor_id: u16,

    /// USB Product ID (PID).
    pub product_id: u16,

    /// Human-readable product name from the driver/firmware.
    pub product_string: Option<String>,

    pub serial_number: Option<String>,

    /// HID Usage Page of the top-level collection (e.g. `0x01` Generic Desktop).
    pub usage_page: Option<u16>,

    /// HID Usage of the top-level collection (e.g. `0x04` Joystick, `0x05` Gamepad).
    pub usage: Option<u16>,

    /// OS/topological path to the device.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// Name to show for this device, falling back to `"<Unknown>"`.
    pub fn description(&self) -> String {
        self.product_string
            .clone()
            .unwrap_or_else(|| "<Unknown>".to_string())
    }
}

impl fmt::Display for DeviceMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.product_string.as_deref().unwrap_or("<Unknown>"),
            self.vendor_id,
            self.product_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_hex_ids() {
        let meta = DeviceMeta {
            vendor_id: 0x054c,
            product_id: 0x05c4,
            product_string: Some("Wireless Controller".into()),
            ..Default::default()
        };
        assert_eq!(meta.to_string(), "Wireless Controller (054c:05c4)");
    }

    #[test]
    fn description_falls_back() {
        assert_eq!(DeviceMeta::default().description(), "<Unknown>");
    }
}
