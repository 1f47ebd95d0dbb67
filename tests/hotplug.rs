use padhub::backends::virtual_input::{VirtualGamepad, VirtualHub};
use padhub::{
    Device, DeviceCatalog, DeviceId, EventFilter, FilteredListener, GamepadButton, GamepadView,
    InputConfig, InputListener,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

#[derive(Clone, Default)]
struct Hooks(Arc<Mutex<Vec<(&'static str, DeviceId)>>>);

impl Hooks {
    fn take(&self) -> Vec<(&'static str, DeviceId)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl InputListener for Hooks {
    fn on_attached(&mut self, d: &Device) {
        self.0.lock().unwrap().push(("attached", d.device_id));
    }
    fn on_detached(&mut self, d: &Device) {
        self.0.lock().unwrap().push(("detached", d.device_id));
    }
    fn on_button_pressed(&mut self, d: &Device, _: u16) {
        self.0.lock().unwrap().push(("pressed", d.device_id));
    }
}

struct Harness {
    hub: VirtualHub,
    catalog: DeviceCatalog,
    now: Instant,
}

impl Harness {
    fn new(config: InputConfig) -> Self {
        let hub = VirtualHub::new();
        let mut catalog = DeviceCatalog::new(config, hub.factory());
        let now = Instant::now();
        // First tick starts the bridge and runs the initial scan.
        catalog.tick_at(now);
        Self { hub, catalog, now }
    }

    fn step(&mut self) {
        assert!(self.catalog.sync(WAIT));
        self.now += Duration::from_millis(20);
        self.catalog.tick_at(self.now);
        assert!(self.catalog.sync(WAIT));
    }

    fn plug(&mut self, name: &str) -> VirtualGamepad {
        let pad = self.hub.plug_gamepad(name);
        self.catalog.scan();
        self.step();
        self.step();
        pad
    }
}

#[test]
fn periodic_scan_picks_up_new_devices() {
    let config = InputConfig {
        scan_interval_ms: 100,
        ..InputConfig::default()
    };
    let mut h = Harness::new(config);
    h.step();
    assert_eq!(h.catalog.device_count(), 0);

    h.hub.plug_gamepad("late");
    // Scans run every 100 ms of tick time; each step advances 20 ms.
    for _ in 0..12 {
        h.step();
    }
    assert_eq!(h.catalog.device_count(), 1);
    assert_eq!(h.catalog.devices().next().unwrap().description, "late");
}

#[test]
fn two_pads_share_one_state() {
    let mut h = Harness::new(InputConfig::default());
    let hooks = Hooks::default();
    h.catalog
        .listeners_mut()
        .add_listener(hooks.clone(), EventFilter::All, None);

    let p1 = h.plug("one");
    let p2 = h.plug("two");
    assert_eq!(
        hooks.take(),
        vec![("attached", DeviceId(0)), ("attached", DeviceId(1))]
    );

    p1.set_axis(1, -32768);
    p2.set_axis(5, 255);
    p2.press_button(9);
    h.step();

    let state = h.catalog.state();
    assert_eq!(state.left_stick().y, 1.0);
    assert_eq!(state.left_trigger(), 1.0);
    assert!(state.is_button_pressed(GamepadButton::Start));
    assert_eq!(hooks.take(), vec![("pressed", DeviceId(1))]);

    p2.unplug();
    h.step();
    let state = h.catalog.state();
    assert!(!state.is_button_pressed(GamepadButton::Start));
    assert_eq!(state.left_trigger(), 0.0);
    assert_eq!(state.left_stick().y, 1.0);
    assert_eq!(hooks.take(), vec![("detached", DeviceId(1))]);
}

#[test]
fn view_reports_edges_across_ticks() {
    let mut h = Harness::new(InputConfig::default());
    let pad = h.plug("pad");
    let mut view = GamepadView::new();

    pad.press_button(0);
    h.step();
    view.update(h.catalog.state());
    assert!(view.is_button_just_pressed(GamepadButton::X));

    h.step();
    view.update(h.catalog.state());
    assert!(view.is_button_down(GamepadButton::X));
    assert!(!view.is_button_just_pressed(GamepadButton::X));

    pad.release_button(0);
    h.step();
    view.update(h.catalog.state());
    assert!(view.is_button_just_released(GamepadButton::X));
}

#[test]
fn overflow_drops_the_backlog() {
    let config = InputConfig {
        queue_capacity: 8,
        ..InputConfig::default()
    };
    let mut h = Harness::new(config);
    let pad = h.plug("pad");

    // Alternate so every sample is a real change.
    for i in 0..9 {
        if i % 2 == 0 {
            pad.press_button(1);
        } else {
            pad.release_button(1);
        }
    }
    h.step();

    assert_eq!(h.catalog.overflow_count(), 1);
    assert!(!h.catalog.state().is_button_pressed(GamepadButton::A));

    pad.press_button(1);
    h.step();
    assert!(h.catalog.state().is_button_pressed(GamepadButton::A));
}

#[test]
fn filtered_listener_sees_one_product() {
    let mut h = Harness::new(InputConfig::default());
    let hooks = Hooks::default();
    let filtered = FilteredListener::new(|d| d.description == "wanted", Box::new(hooks.clone()));
    h.catalog
        .listeners_mut()
        .add_listener(filtered, EventFilter::ButtonsOnly, None);

    let other = h.plug("other");
    let wanted = h.plug("wanted");
    other.press_button(2);
    wanted.press_button(2);
    h.step();

    assert_eq!(
        hooks.take(),
        vec![("attached", DeviceId(1)), ("pressed", DeviceId(1))]
    );
}

#[test]
fn dropping_the_catalog_stops_cleanly() {
    let mut h = Harness::new(InputConfig::default());
    let hooks = Hooks::default();
    h.catalog
        .listeners_mut()
        .add_listener(hooks.clone(), EventFilter::All, None);
    h.plug("pad");
    hooks.take();

    drop(h.catalog);
    assert_eq!(hooks.take(), vec![("detached", DeviceId(0))]);
    assert_eq!(h.hub.plugged_count(), 1);
}
