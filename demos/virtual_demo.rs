use padhub::backends::virtual_input::VirtualHub;
use padhub::{DeviceCatalog, EventFilter, GamepadButton, InputConfig, LogListener};
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    // Plug a virtual pad before the catalog's first scan
    let hub = VirtualHub::new();
    let pad = hub.plug_gamepad("Demo Virtual Pad");

    let mut catalog = DeviceCatalog::new(InputConfig::default(), hub.factory());
    catalog
        .listeners_mut()
        .add_listener(LogListener::new(), EventFilter::All, None);

    let settle = |catalog: &mut DeviceCatalog| {
        catalog.sync(Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(10));
        catalog.tick();
        catalog.sync(Duration::from_secs(1));
    };

    catalog.tick();
    settle(&mut catalog);

    // Inject some sample input
    pad.set_axis(0, 24_000);
    pad.press_button(1);
    pad.set_hat(2);
    settle(&mut catalog);

    let state = catalog.state();
    println!("(Virtual) left stick = {:?}", state.left_stick());
    println!("(Virtual) A pressed = {}", state.is_button_pressed(GamepadButton::A));
    println!(
        "(Virtual) held = {:?}",
        state.pressed_buttons().collect::<Vec<_>>()
    );

    pad.unplug();
    settle(&mut catalog);
    println!("(Virtual) devices after unplug = {}", catalog.device_count());
}
