//! Events and element descriptions.
//!
//! Raw input travels from the bridge thread to the application thread as
//! [`RawEvent`]s: a device id, a discriminant, the device-local logical id and
//! the untouched integer sample. Normalization happens later, on the
//! application thread, once the owning device has been looked up.
//!
//! ## Identifiers
//! - [`RawHandle`]: backend-assigned handle of a physical device. Only meaningful to
//!   the backend that issued it.
//! - [`Cookie`]: backend-assigned handle of one input element in a device's descriptor.
//! - [`DeviceId`]: catalog-assigned, strictly increasing, never reused.

use crate::metadata::DeviceMeta;
use std::fmt;

/// Platform handle of a physical device.
pub type RawHandle = u64;

/// Platform handle of one input element on a device.
pub type Cookie = u32;

/// Catalog-assigned device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Which kind of logical element a [`RawEvent`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Axis,
    Button,
}

/// One raw sample handed from the bridge thread to the application thread.
///
/// `device` is a lookup key only. The device may already be gone by the time the
/// event is processed, in which case the event is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub device: DeviceId,
    pub kind: RawKind,
    /// Device-local logical id (descriptor enumeration order).
    pub id: u16,
    /// Raw sample in hardware units.
    pub value: i32,
}

impl RawEvent {
    pub fn axis(device: DeviceId, id: u16, value: i32) -> Self {
        Self {
            device,
            kind: RawKind::Axis,
            id,
            value,
        }
    }

    pub fn button(device: DeviceId, id: u16, value: i32) -> Self {
        Self {
            device,
            kind: RawKind::Button,
            id,
            value,
        }
    }
}

/// Category of an input element as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Axis,
    Button,
    /// Anything the catalog does not classify (outputs, vendor data, ...).
    Other,
}

/// Describes one input element exposed by a device.
///
/// Backends populate this from device descriptors. Ranges are in raw hardware
/// units.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementDesc {
    pub cookie: Cookie,
    pub kind: ElementKind,
    pub usage_page: u16,
    pub usage: u16,
    pub logical_min: i32,
    pub logical_max: i32,
    /// Noise tolerance, in raw units.
    pub fuzz: i32,
    /// Deadzone radius, in raw units.
    pub flat: i32,
}

impl ElementDesc {
    pub fn button(cookie: Cookie) -> Self {
        Self {
            cookie,
            kind: ElementKind::Button,
            usage_page: 0x09,
            usage: 0,
            logical_min: 0,
            logical_max: 1,
            fuzz: 0,
            flat: 0,
        }
    }

    pub fn axis(cookie: Cookie, logical_min: i32, logical_max: i32) -> Self {
        Self {
            cookie,
            kind: ElementKind::Axis,
            usage_page: 0x01,
            usage: 0,
            logical_min,
            logical_max,
            fuzz: 0,
            flat: 0,
        }
    }

    pub fn with_usage(mut self, usage_page: u16, usage: u16) -> Self {
        self.usage_page = usage_page;
        self.usage = usage;
        self
    }

    pub fn with_noise(mut self, fuzz: i32, flat: i32) -> Self {
        self.fuzz = fuzz;
        self.flat = flat;
        self
    }
}

/// Everything a backend knows about a newly visible device.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceDescriptor {
    pub handle: RawHandle,
    pub meta: DeviceMeta,
    /// Input elements in platform enumeration order.
    pub elements: Vec<ElementDesc>,
}
