//! Listener hooks and the bus that fans events out to them.
//!
//! The catalog emits four kinds of notifications on the application thread,
//! from inside `tick()`: a device was attached, a device was detached, a logical
//! button changed, a logical axis moved (after calibration and debounce). Each
//! registered [`InputListener`] receives those that pass its [`EventFilter`] and
//! optional device tag.

use crate::device::Device;
use crate::event::DeviceId;
use std::collections::BTreeMap;

/// Capability hooks. Every method defaults to a no-op.
pub trait InputListener: Send {
    fn on_attached(&mut self, _device: &Device) {}
    fn on_detached(&mut self, _device: &Device) {}
    fn on_button_pressed(&mut self, _device: &Device, _button_id: u16) {}
    fn on_button_released(&mut self, _device: &Device, _button_id: u16) {}
    /// `value` is normalized to `[-1, 1]`; `raw` is the untouched hardware sample.
    fn on_axis_moved(&mut self, _device: &Device, _axis_id: u16, _value: f32, _raw: i32) {}
}

/// One notification, borrowed from the catalog for the duration of the emit.
#[derive(Debug, Clone, Copy)]
pub enum BusEvent<'a> {
    Attached(&'a Device),
    Detached(&'a Device),
    Button {
        device: &'a Device,
        button_id: u16,
        pressed: bool,
    },
    Axis {
        device: &'a Device,
        axis_id: u16,
        value: f32,
        raw: i32,
    },
}

impl<'a> BusEvent<'a> {
    pub fn device(&self) -> &'a Device {
        match *self {
            BusEvent::Attached(d) | BusEvent::Detached(d) => d,
            BusEvent::Button { device, .. } | BusEvent::Axis { device, .. } => device,
        }
    }

    /// Hand this event to the matching hook of `listener`.
    pub fn deliver(&self, listener: &mut dyn InputListener) {
        match *self {
            BusEvent::Attached(d) => listener.on_attached(d),
            BusEvent::Detached(d) => listener.on_detached(d),
            BusEvent::Button {
                device,
                button_id,
                pressed: true,
            } => listener.on_button_pressed(device, button_id),
            BusEvent::Button {
                device,
                button_id,
                pressed: false,
            } => listener.on_button_released(device, button_id),
            BusEvent::Axis {
                device,
                axis_id,
                value,
                raw,
            } => listener.on_axis_moved(device, axis_id, value, raw),
        }
    }
}

/// Which input events a listener wants. Attach and detach always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    AxisOnly,
    ButtonsOnly,
}

impl EventFilter {
    fn passes(self, event: &BusEvent<'_>) -> bool {
        match (self, event) {
            (_, BusEvent::Attached(_) | BusEvent::Detached(_)) => true,
            (EventFilter::All, _) => true,
            (EventFilter::AxisOnly, BusEvent::Axis { .. }) => true,
            (EventFilter::ButtonsOnly, BusEvent::Button { .. }) => true,
            _ => false,
        }
    }
}

struct ListenerEntry {
    listener: Box<dyn InputListener>,
    enabled: bool,
    filter: EventFilter,
    /// Only events for this device, if set.
    tag: Option<DeviceId>,
}

/// Registered listeners, in registration order.
#[derive(Default)]
pub struct ListenerBus {
    next_id: u64,
    listeners: BTreeMap<u64, ListenerEntry>,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener with optional filtering and device tag. Returns its id.
    pub fn add_listener(
        &mut self,
        listener: impl InputListener + 'static,
        filter: EventFilter,
        tag: Option<DeviceId>,
    ) -> u64 {
        let id = self.next_id;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                tag,
            },
        );
        self.next_id += 1;
        id
    }

    pub fn enable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Mutes a listener without removing it.
    pub fn disable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    /// Unregisters a listener. Returns `false` if the id was unknown.
    pub fn remove_listener(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Emits one event to all enabled, matching listeners.
    pub fn emit(&mut self, event: BusEvent<'_>) {
        let device_id = event.device().device_id;
        for entry in self.listeners.values_mut() {
            if !entry.enabled {
                continue;
            }
            if entry.tag.is_some_and(|wanted| wanted != device_id) {
                continue;
            }
            if entry.filter.passes(&event) {
                event.deliver(entry.listener.as_mut());
            }
        }
    }
}
