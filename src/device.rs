//! Device records and their element layout.
//!
//! A [`DeviceLayout`] is derived once from a [`DeviceDescriptor`] when the device
//! is attached: elements are classified into buttons and axes, logical ids are
//! handed out in enumeration order, and the [`CookieMap`] that the bridge thread
//! uses to tag incoming samples is built. The layout is immutable afterwards.

use crate::error::InputError;
use crate::event::{Cookie, DeviceDescriptor, DeviceId, ElementKind, RawHandle, RawKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Attached,
    Disconnected,
}

/// Public view of one attached device.
///
/// This is what listeners receive. `axes` holds the last applied normalized value
/// per logical axis, `buttons` the last raw pressed state per logical button.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub device_id: DeviceId,
    pub vendor_id: u16,
    pub product_id: u16,
    pub description: String,
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub status: ConnectionStatus,
}

impl Device {
    pub fn is_attached(&self) -> bool {
        self.status == ConnectionStatus::Attached
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisDescriptor {
    pub axis_id: u16,
    pub cookie: Cookie,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonDescriptor {
    pub button_id: u16,
    pub cookie: Cookie,
}

/// Logical ids an element handle resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookieEntry {
    pub axis_id: Option<u16>,
    pub button_id: Option<u16>,
}

impl CookieEntry {
    /// The event discriminant and logical id for this element, if it has one.
    pub fn target(&self) -> Option<(RawKind, u16)> {
        match (self.button_id, self.axis_id) {
            (Some(b), _) => Some((RawKind::Button, b)),
            (None, Some(a)) => Some((RawKind::Axis, a)),
            (None, None) => None,
        }
    }
}

/// Raw element handle → logical ids. One entry per reported element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieMap {
    entries: HashMap<Cookie, CookieEntry>,
}

impl CookieMap {
    pub fn get(&self, cookie: Cookie) -> Option<&CookieEntry> {
        self.entries.get(&cookie)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Axes, buttons and cookie map of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLayout {
    pub axes: Vec<AxisDescriptor>,
    pub buttons: Vec<ButtonDescriptor>,
    pub cookies: CookieMap,
}

impl DeviceLayout {
    /// Classify a descriptor's elements.
    ///
    /// Fails with [`InputError::Descriptor`] when the descriptor has no elements,
    /// repeats a cookie, declares an axis with an empty range, or has more elements
    /// of one kind than a logical id can address.
    pub fn from_descriptor(desc: &DeviceDescriptor) -> Result<Self, InputError> {
        let malformed = |reason: String| InputError::Descriptor {
            handle: desc.handle,
            reason,
        };

        if desc.elements.is_empty() {
            return Err(malformed("no input elements".into()));
        }

        let mut axes = Vec::new();
        let mut buttons = Vec::new();
        let mut entries = HashMap::with_capacity(desc.elements.len());

        for el in &desc.elements {
            let mut entry = CookieEntry::default();
            match el.kind {
                ElementKind::Button => {
                    let button_id = u16::try_from(buttons.len())
                        .map_err(|_| malformed("too many buttons".into()))?;
                    buttons.push(ButtonDescriptor {
                        button_id,
                        cookie: el.cookie,
                    });
                    entry.button_id = Some(button_id);
                }
                ElementKind::Axis => {
                    if el.logical_max <= el.logical_min {
                        return Err(malformed(format!(
                            "axis cookie {} has empty range [{}, {}]",
                            el.cookie, el.logical_min, el.logical_max
                        )));
                    }
                    let axis_id = u16::try_from(axes.len())
                        .map_err(|_| malformed("too many axes".into()))?;
                    axes.push(AxisDescriptor {
                        axis_id,
                        cookie: el.cookie,
                        min: el.logical_min,
                        max: el.logical_max,
                        fuzz: el.fuzz.max(0),
                        flat: el.flat.max(0),
                    });
                    entry.axis_id = Some(axis_id);
                }
                ElementKind::Other => {}
            }
            if entries.insert(el.cookie, entry).is_some() {
                return Err(malformed(format!("duplicate cookie {}", el.cookie)));
            }
        }

        Ok(Self {
            axes,
            buttons,
            cookies: CookieMap { entries },
        })
    }
}

/// Catalog-private record: the public view plus everything needed to service it.
#[derive(Debug)]
pub(crate) struct DeviceRecord {
    pub device: Device,
    pub handle: RawHandle,
    pub layout: DeviceLayout,
    pub handle_open: bool,
    /// Whether each axis has applied a sample yet; the first one always passes.
    pub axis_seen: Vec<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ElementDesc;
    use crate::metadata::DeviceMeta;

    fn descriptor(elements: Vec<ElementDesc>) -> DeviceDescriptor {
        DeviceDescriptor {
            handle: 7,
            meta: DeviceMeta::default(),
            elements,
        }
    }

    #[test]
    fn ids_follow_enumeration_order() {
        let desc = descriptor(vec![
            ElementDesc::axis(10, -128, 127),
            ElementDesc::button(11),
            ElementDesc::axis(12, 0, 255).with_noise(2, 4),
            ElementDesc::button(13),
            ElementDesc {
                kind: ElementKind::Other,
                ..ElementDesc::button(14)
            },
        ]);
        let layout = DeviceLayout::from_descriptor(&desc).unwrap();

        assert_eq!(layout.axes.len(), 2);
        assert_eq!(layout.axes[1].cookie, 12);
        assert_eq!(layout.axes[1].axis_id, 1);
        assert_eq!((layout.axes[1].fuzz, layout.axes[1].flat), (2, 4));
        assert_eq!(layout.buttons[1].cookie, 13);
        assert_eq!(layout.buttons[1].button_id, 1);

        assert_eq!(layout.cookies.len(), desc.elements.len());
        assert_eq!(
            layout.cookies.get(12).unwrap().target(),
            Some((RawKind::Axis, 1))
        );
        assert_eq!(
            layout.cookies.get(11).unwrap().target(),
            Some((RawKind::Button, 0))
        );
        assert_eq!(layout.cookies.get(14).unwrap().target(), None);
        assert!(layout.cookies.get(99).is_none());
    }

    #[test]
    fn rejects_empty_descriptor() {
        let err = DeviceLayout::from_descriptor(&descriptor(vec![])).unwrap_err();
        assert!(matches!(err, InputError::Descriptor { handle: 7, .. }));
    }

    #[test]
    fn rejects_duplicate_cookie() {
        let desc = descriptor(vec![ElementDesc::button(1), ElementDesc::axis(1, 0, 10)]);
        assert!(DeviceLayout::from_descriptor(&desc).is_err());
    }

    #[test]
    fn rejects_empty_axis_range() {
        let desc = descriptor(vec![ElementDesc::axis(1, 10, 10)]);
        assert!(DeviceLayout::from_descriptor(&desc).is_err());
    }
}
