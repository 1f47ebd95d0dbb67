//! The device catalog: discovery, attach/detach bookkeeping and the tick loop.
//!
//! [`DeviceCatalog`] lives on the application thread. It owns the
//! [`EventBridge`], the known devices (an id-keyed arena), the
//! [`StateAggregator`] and the [`ListenerBus`]. Everything observable changes
//! inside [`tick`](DeviceCatalog::tick):
//!
//! 1. every `scan_interval`, ask the platform for new devices;
//! 2. attach newly reported devices, mark removed ones `Disconnected`;
//! 3. every `tick_interval`, drain the event queue and dispatch each event in
//!    arrival order (calibrate, debounce, aggregate, notify listeners);
//! 4. reap `Disconnected` devices, firing the detach hook once per device.
//!
//! Events that refer to a device that is no longer attached are dropped by id
//! lookup.
//!
//! # Example
//! ```no_run
//! use padhub::{backends::virtual_input::VirtualHub, DeviceCatalog, GamepadButton, InputConfig};
//!
//! let hub = VirtualHub::new();
//! let pad = hub.plug_gamepad("Virtual Pad");
//! let mut catalog = DeviceCatalog::new(InputConfig::default(), hub.factory());
//!
//! loop {
//!     catalog.tick();
//!     if catalog.state().is_button_pressed(GamepadButton::Start) {
//!         break;
//!     }
//!     # pad.press_button(9);
//!     std::thread::sleep(std::time::Duration::from_millis(5));
//! }
//! ```

use crate::aggregator::{GamepadState, StateAggregator};
use crate::backends::BackendFactory;
use crate::bridge::EventBridge;
use crate::calibration::{button_state, AxisCalibration};
use crate::config::InputConfig;
use crate::device::{ConnectionStatus, Device, DeviceLayout, DeviceRecord};
use crate::event::{DeviceDescriptor, DeviceId, RawEvent, RawHandle, RawKind};
use crate::eventbus::{BusEvent, ListenerBus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

pub struct DeviceCatalog {
    config: InputConfig,
    bridge: EventBridge,
    devices: BTreeMap<DeviceId, DeviceRecord>,
    by_handle: HashMap<RawHandle, DeviceId>,
    next_id: u32,
    aggregator: StateAggregator,
    listeners: ListenerBus,
    last_scan: Option<Instant>,
    last_drain: Option<Instant>,
}

impl DeviceCatalog {
    /// Create a catalog over the backend built by `factory`.
    ///
    /// Nothing is started until the first [`tick`](Self::tick) or
    /// [`scan`](Self::scan).
    pub fn new(config: InputConfig, factory: BackendFactory) -> Self {
        let bridge = EventBridge::new(factory, &config);
        let aggregator = StateAggregator::new(&config);
        Self {
            config,
            bridge,
            devices: BTreeMap::new(),
            by_handle: HashMap::new(),
            next_id: 0,
            aggregator,
            listeners: ListenerBus::new(),
            last_scan: None,
            last_drain: None,
        }
    }

    /// Catalog over the system HID devices with the default configuration.
    #[cfg(feature = "hid")]
    #[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
    pub fn discover() -> Self {
        Self::with_config(InputConfig::default())
    }

    /// Catalog over the system HID devices.
    #[cfg(feature = "hid")]
    #[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
    pub fn with_config(config: InputConfig) -> Self {
        Self::new(config, crate::backends::hid::HidBackend::factory())
    }

    /// Ask the platform for newly visible devices and attach every one already
    /// reported. Devices found by this request are attached on a later tick.
    pub fn scan(&mut self) {
        debug!("Scanning for input devices");
        self.bridge.request_scan();
        self.apply_pending();
    }

    /// Register a newly visible device.
    ///
    /// Returns `None` if the handle is already known or the descriptor is
    /// malformed (the device is then skipped).
    pub fn attach(&mut self, descriptor: DeviceDescriptor) -> Option<DeviceId> {
        if self.by_handle.contains_key(&descriptor.handle) {
            trace!("Device {} already attached", descriptor.handle);
            return None;
        }
        let layout = match DeviceLayout::from_descriptor(&descriptor) {
            Ok(layout) => layout,
            Err(e) => {
                warn!("{e}; skipping {}", descriptor.meta);
                return None;
            }
        };

        let device_id = DeviceId(self.next_id);
        self.next_id += 1;

        let device = Device {
            device_id,
            vendor_id: descriptor.meta.vendor_id,
            product_id: descriptor.meta.product_id,
            description: descriptor.meta.description(),
            axes: vec![0.0; layout.axes.len()],
            buttons: vec![false; layout.buttons.len()],
            status: ConnectionStatus::Attached,
        };
        self.bridge
            .open(descriptor.handle, device_id, Arc::new(layout.cookies.clone()));

        info!(
            "Attached {device_id}: {} with {} axes, {} buttons",
            descriptor.meta,
            layout.axes.len(),
            layout.buttons.len()
        );
        let record = DeviceRecord {
            device,
            handle: descriptor.handle,
            axis_seen: vec![false; layout.axes.len()],
            layout,
            handle_open: true,
        };
        self.by_handle.insert(record.handle, device_id);
        let record = self.devices.entry(device_id).or_insert(record);
        self.listeners.emit(BusEvent::Attached(&record.device));
        Some(device_id)
    }

    /// Mark a device disconnected and close its handle. Idempotent.
    ///
    /// The device stays visible until the reap pass of the next tick.
    pub fn detach(&mut self, device_id: DeviceId) {
        let Some(record) = self.devices.get_mut(&device_id) else {
            return;
        };
        if record.device.status == ConnectionStatus::Attached {
            debug!("Detaching {device_id}");
            record.device.status = ConnectionStatus::Disconnected;
        }
        if record.handle_open {
            record.handle_open = false;
            self.bridge.close(record.handle);
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// One iteration of the input loop, with an explicit clock.
    pub fn tick_at(&mut self, now: Instant) {
        if due(self.last_scan, now, self.config.scan_interval()) {
            self.last_scan = Some(now);
            self.scan();
        } else {
            self.apply_pending();
        }

        if due(self.last_drain, now, self.config.tick_interval()) {
            self.last_drain = Some(now);
            self.drain();
        }

        self.reap();
    }

    /// Wait until the bridge has applied every earlier request and delivered
    /// pending platform input, or `timeout` elapses. Nothing is dispatched; call
    /// [`tick`](Self::tick) afterwards.
    pub fn sync(&mut self, timeout: Duration) -> bool {
        self.bridge.sync(timeout)
    }

    pub fn state(&self) -> &GamepadState {
        self.aggregator.state()
    }

    /// Devices currently in the catalog, in id order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> + '_ {
        self.devices.values().map(|r| &r.device)
    }

    pub fn device(&self, device_id: DeviceId) -> Option<&Device> {
        self.devices.get(&device_id).map(|r| &r.device)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerBus {
        &mut self.listeners
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// `false` once the platform backend failed to initialize.
    pub fn is_available(&self) -> bool {
        !self.bridge.is_failed()
    }

    /// How many times the event queue overflowed and was cleared.
    pub fn overflow_count(&self) -> u64 {
        self.bridge.queue().overflow_count()
    }

    /// Detach every device, fire the detach hooks and stop the bridge.
    pub fn shutdown(&mut self) {
        let ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        for id in ids {
            self.detach(id);
        }
        self.reap();
        self.bridge.shutdown();
    }

    fn apply_pending(&mut self) {
        let pending = self.bridge.take_pending();
        for descriptor in pending.attached {
            self.attach(descriptor);
        }
        for handle in pending.detached {
            match self.by_handle.get(&handle) {
                Some(&id) => self.detach(id),
                None => trace!("Removal of unknown device {handle}"),
            }
        }
    }

    fn drain(&mut self) {
        let queue = Arc::clone(self.bridge.queue());
        let handled = queue.drain_up_to(queue.capacity(), |ev| self.dispatch(ev));
        if handled > 0 {
            trace!("Dispatched {handled} input event(s)");
        }
    }

    fn dispatch(&mut self, ev: RawEvent) {
        let Some(record) = self.devices.get_mut(&ev.device) else {
            trace!("Dropping event for removed {}", ev.device);
            return;
        };
        if !record.device.is_attached() {
            return;
        }
        let id = ev.id as usize;

        match ev.kind {
            RawKind::Button => {
                let Some(slot) = record.device.buttons.get_mut(id) else {
                    return;
                };
                let pressed = button_state(ev.value);
                if *slot == pressed {
                    return;
                }
                *slot = pressed;
                self.aggregator.button_changed(ev.device, ev.id, pressed);
                self.listeners.emit(BusEvent::Button {
                    device: &record.device,
                    button_id: ev.id,
                    pressed,
                });
            }
            RawKind::Axis => {
                let Some(desc) = record.layout.axes.get(id) else {
                    return;
                };
                let cal = AxisCalibration::from(desc);
                let value = cal.normalize(ev.value);
                if record.axis_seen[id] && !cal.should_apply(record.device.axes[id], value) {
                    return;
                }
                record.axis_seen[id] = true;
                record.device.axes[id] = value;
                self.aggregator.axis_moved(ev.device, ev.id, value, ev.value);
                self.listeners.emit(BusEvent::Axis {
                    device: &record.device,
                    axis_id: ev.id,
                    value,
                    raw: ev.value,
                });
            }
        }
    }

    fn reap(&mut self) {
        let gone: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|(_, r)| !r.device.is_attached())
            .map(|(id, _)| *id)
            .collect();
        for id in gone {
            let Some(record) = self.devices.remove(&id) else {
                continue;
            };
            self.by_handle.remove(&record.handle);
            self.aggregator.device_removed(id);
            info!("Removed {id} ({})", record.device.description);
            self.listeners.emit(BusEvent::Detached(&record.device));
        }
    }
}

impl Drop for DeviceCatalog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.map_or(true, |t| now.saturating_duration_since(t) >= interval)
}
