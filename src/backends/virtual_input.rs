//! Programmatic backend.
//!
//! A [`VirtualHub`] is a cloneable handle shared between the application (or a
//! test) and the [`VirtualBackend`] running on the bridge thread. Plugging a
//! device makes it visible to the next discovery pass; unplugging and value
//! changes are queued and delivered by the next pump, in the order they were
//! issued. Values for devices that have not been opened are dropped, as a real
//! platform would.
//!
//! [`VirtualGamepad`] wraps one plugged device with the standard gamepad layout
//! so callers can press buttons and move sticks by logical id.

use super::{Backend, BackendFactory, PlatformSink};
use crate::error::InputError;
use crate::event::{Cookie, DeviceDescriptor, ElementDesc, RawHandle};
use crate::metadata::DeviceMeta;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Unplug(RawHandle),
    Value(RawHandle, Cookie, i32),
}

#[derive(Default)]
struct HubState {
    next_handle: RawHandle,
    plugged: BTreeMap<RawHandle, DeviceDescriptor>,
    refuse_open: HashSet<RawHandle>,
    ops: VecDeque<Op>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<HubState>,
    wake: Condvar,
}

/// Application-side control of the virtual backend.
#[derive(Clone, Default)]
pub struct VirtualHub {
    shared: Arc<Shared>,
}

impl VirtualHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a device visible. The descriptor's `handle` is replaced by a freshly
    /// assigned one, which is returned.
    pub fn plug(&self, meta: DeviceMeta, elements: Vec<ElementDesc>) -> RawHandle {
        let mut st = self.shared.state.lock();
        st.next_handle += 1;
        let handle = st.next_handle;
        st.plugged.insert(
            handle,
            DeviceDescriptor {
                handle,
                meta,
                elements,
            },
        );
        debug!("virtual device {handle} plugged");
        handle
    }

    /// Plug a device with the standard gamepad layout (see [`VirtualGamepad`]).
    pub fn plug_gamepad(&self, name: &str) -> VirtualGamepad {
        let meta = DeviceMeta {
            vendor_id: 0xFEED,
            product_id: 0x0001,
            product_string: Some(name.to_string()),
            ..DeviceMeta::default()
        };
        let handle = self.plug(meta, VirtualGamepad::elements());
        VirtualGamepad {
            hub: self.clone(),
            handle,
        }
    }

    /// Remove a device. Returns `false` if it was not plugged.
    pub fn unplug(&self, handle: RawHandle) -> bool {
        let mut st = self.shared.state.lock();
        if st.plugged.remove(&handle).is_none() {
            return false;
        }
        st.ops.push_back(Op::Unplug(handle));
        drop(st);
        self.shared.wake.notify_all();
        true
    }

    /// Report a new raw value for one element.
    pub fn set_value(&self, handle: RawHandle, cookie: Cookie, value: i32) {
        self.shared
            .state
            .lock()
            .ops
            .push_back(Op::Value(handle, cookie, value));
        self.shared.wake.notify_all();
    }

    /// Make every later `open` of `handle` fail.
    pub fn refuse_open(&self, handle: RawHandle) {
        self.shared.state.lock().refuse_open.insert(handle);
    }

    pub fn plugged_count(&self) -> usize {
        self.shared.state.lock().plugged.len()
    }

    /// Factory for a backend fed by this hub.
    pub fn factory(&self) -> BackendFactory {
        let hub = self.clone();
        Box::new(move || Ok(Box::new(VirtualBackend::new(hub)) as Box<dyn Backend>))
    }
}

/// Backend side of a [`VirtualHub`].
pub struct VirtualBackend {
    hub: VirtualHub,
    reported: BTreeSet<RawHandle>,
    opened: HashSet<RawHandle>,
}

impl VirtualBackend {
    pub fn new(hub: VirtualHub) -> Self {
        Self {
            hub,
            reported: BTreeSet::new(),
            opened: HashSet::new(),
        }
    }
}

impl Backend for VirtualBackend {
    fn name(&self) -> &str {
        "virtual"
    }

    fn discover(&mut self, sink: &mut dyn PlatformSink) {
        let (added, removed): (Vec<DeviceDescriptor>, Vec<RawHandle>) = {
            let st = self.hub.shared.state.lock();
            let added = st
                .plugged
                .values()
                .filter(|d| !self.reported.contains(&d.handle))
                .cloned()
                .collect();
            let removed = self
                .reported
                .iter()
                .filter(|h| !st.plugged.contains_key(h))
                .copied()
                .collect();
            (added, removed)
        };

        for handle in removed {
            self.reported.remove(&handle);
            self.opened.remove(&handle);
            sink.device_removed(handle);
        }
        for desc in added {
            self.reported.insert(desc.handle);
            sink.device_added(desc);
        }
    }

    fn open(&mut self, handle: RawHandle) -> Result<(), InputError> {
        let refused = {
            let st = self.hub.shared.state.lock();
            if st.refuse_open.contains(&handle) {
                Some("refused")
            } else if !st.plugged.contains_key(&handle) {
                Some("not plugged")
            } else {
                None
            }
        };
        match refused {
            Some(reason) => Err(InputError::DeviceOpen {
                handle,
                reason: reason.into(),
            }),
            None => {
                self.opened.insert(handle);
                Ok(())
            }
        }
    }

    fn close(&mut self, handle: RawHandle) {
        self.opened.remove(&handle);
    }

    fn pump(&mut self, budget: Duration, sink: &mut dyn PlatformSink) {
        let ops: Vec<Op> = {
            let mut st = self.hub.shared.state.lock();
            if st.ops.is_empty() {
                self.hub.shared.wake.wait_for(&mut st, budget);
            }
            st.ops.drain(..).collect()
        };

        for op in ops {
            match op {
                Op::Unplug(handle) => {
                    // Already reported gone by a discovery pass otherwise.
                    if self.reported.remove(&handle) {
                        self.opened.remove(&handle);
                        sink.device_removed(handle);
                    }
                }
                Op::Value(handle, cookie, value) => {
                    if self.opened.contains(&handle) {
                        sink.value_changed(handle, cookie, value);
                    }
                }
            }
        }
    }
}

/// A plugged device with the standard gamepad layout.
///
/// Cookies `1..=12` are buttons 0..11. Cookies `13..=19` are axes 0..6: left
/// stick x/y, right stick x/y (`-32768..=32767`), hat (`0..=8`, 8 = centered),
/// left and right trigger (`0..=255`).
#[derive(Clone)]
pub struct VirtualGamepad {
    hub: VirtualHub,
    handle: RawHandle,
}

impl VirtualGamepad {
    pub const BUTTONS: u16 = 12;
    const FIRST_AXIS_COOKIE: Cookie = Self::BUTTONS as Cookie + 1;
    const HAT_AXIS: u16 = 4;

    fn elements() -> Vec<ElementDesc> {
        let mut elements: Vec<ElementDesc> = (1..=Self::BUTTONS as Cookie)
            .map(|c| ElementDesc::button(c).with_usage(0x09, c as u16))
            .collect();
        let axes = [
            (0x30, -32768, 32767),
            (0x31, -32768, 32767),
            (0x33, -32768, 32767),
            (0x34, -32768, 32767),
            (0x39, 0, 8),
            (0x32, 0, 255),
            (0x35, 0, 255),
        ];
        for (i, (usage, min, max)) in axes.into_iter().enumerate() {
            elements.push(
                ElementDesc::axis(Self::FIRST_AXIS_COOKIE + i as Cookie, min, max)
                    .with_usage(0x01, usage),
            );
        }
        elements
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Inject a raw value for one element.
    pub fn feed(&self, cookie: Cookie, value: i32) {
        self.hub.set_value(self.handle, cookie, value);
    }

    pub fn press_button(&self, button: u16) {
        self.feed(button as Cookie + 1, 1);
    }

    pub fn release_button(&self, button: u16) {
        self.feed(button as Cookie + 1, 0);
    }

    /// Set a raw axis value by logical axis id.
    pub fn set_axis(&self, axis: u16, raw: i32) {
        self.feed(Self::FIRST_AXIS_COOKIE + axis as Cookie, raw);
    }

    /// Set the hat slot (0 = up, clockwise, 8 = centered).
    pub fn set_hat(&self, slot: i32) {
        self.set_axis(Self::HAT_AXIS, slot);
    }

    pub fn unplug(&self) -> bool {
        self.hub.unplug(self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        added: Vec<RawHandle>,
        removed: Vec<RawHandle>,
        values: Vec<(RawHandle, Cookie, i32)>,
    }

    impl PlatformSink for Recorder {
        fn device_added(&mut self, descriptor: DeviceDescriptor) {
            self.added.push(descriptor.handle);
        }
        fn device_removed(&mut self, handle: RawHandle) {
            self.removed.push(handle);
        }
        fn value_changed(&mut self, handle: RawHandle, cookie: Cookie, value: i32) {
            self.values.push((handle, cookie, value));
        }
    }

    const IDLE: Duration = Duration::from_millis(1);

    #[test]
    fn discovery_reports_each_device_once() {
        let hub = VirtualHub::new();
        let mut backend = VirtualBackend::new(hub.clone());
        let mut rec = Recorder::default();

        let a = hub.plug_gamepad("A").handle();
        backend.discover(&mut rec);
        backend.discover(&mut rec);
        let b = hub.plug_gamepad("B").handle();
        backend.discover(&mut rec);

        assert_eq!(rec.added, vec![a, b]);
        assert!(a < b);
    }

    #[test]
    fn values_only_flow_for_opened_devices() {
        let hub = VirtualHub::new();
        let mut backend = VirtualBackend::new(hub.clone());
        let mut rec = Recorder::default();
        let pad = hub.plug_gamepad("pad");
        backend.discover(&mut rec);

        pad.press_button(0);
        backend.pump(IDLE, &mut rec);
        assert!(rec.values.is_empty());

        backend.open(pad.handle()).unwrap();
        pad.press_button(3);
        pad.set_axis(5, 255);
        backend.pump(IDLE, &mut rec);
        assert_eq!(
            rec.values,
            vec![(pad.handle(), 4, 1), (pad.handle(), 18, 255)]
        );

        backend.close(pad.handle());
        pad.release_button(3);
        backend.pump(IDLE, &mut rec);
        assert_eq!(rec.values.len(), 2);
    }

    #[test]
    fn unplug_is_reported_once() {
        let hub = VirtualHub::new();
        let mut backend = VirtualBackend::new(hub.clone());
        let mut rec = Recorder::default();
        let pad = hub.plug_gamepad("pad");
        backend.discover(&mut rec);

        assert!(pad.unplug());
        assert!(!pad.unplug());
        backend.discover(&mut rec);
        backend.pump(IDLE, &mut rec);
        assert_eq!(rec.removed, vec![pad.handle()]);
        assert_eq!(hub.plugged_count(), 0);
    }

    #[test]
    fn open_fails_for_unknown_or_refused() {
        let hub = VirtualHub::new();
        let mut backend = VirtualBackend::new(hub.clone());
        assert!(matches!(
            backend.open(42),
            Err(InputError::DeviceOpen { handle: 42, .. })
        ));

        let pad = hub.plug_gamepad("pad");
        hub.refuse_open(pad.handle());
        assert!(backend.open(pad.handle()).is_err());
    }

    #[test]
    fn gamepad_layout_has_twelve_buttons_and_seven_axes() {
        let elements = VirtualGamepad::elements();
        assert_eq!(elements.len(), 19);
        let hat = &elements[12 + 4];
        assert_eq!((hat.cookie, hat.logical_min, hat.logical_max), (17, 0, 8));
    }

    #[test]
    fn pump_wakes_on_new_value() {
        let hub = VirtualHub::new();
        let mut backend = VirtualBackend::new(hub.clone());
        let mut rec = Recorder::default();
        let pad = hub.plug_gamepad("pad");
        backend.discover(&mut rec);
        backend.open(pad.handle()).unwrap();

        let feeder = {
            let pad = pad.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                pad.set_hat(2);
            })
        };
        let start = std::time::Instant::now();
        while rec.values.is_empty() && start.elapsed() < Duration::from_secs(5) {
            backend.pump(Duration::from_secs(5), &mut rec);
        }
        feeder.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(rec.values, vec![(pad.handle(), 17, 2)]);
    }
}
