use padhub::{DeviceCatalog, EventFilter, GamepadView, InputConfig, LogListener};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => InputConfig::load(&path).expect("load config"),
        None => InputConfig::default(),
    };
    let mut catalog = DeviceCatalog::with_config(config);
    catalog
        .listeners_mut()
        .add_listener(LogListener::new(), EventFilter::ButtonsOnly, None);

    let mut view = GamepadView::new();
    let mut last_print = Instant::now();
    loop {
        catalog.tick();
        view.update(catalog.state());

        for button in padhub::GamepadButton::ALL {
            if view.is_button_just_pressed(button) {
                println!("{button:?} down");
            }
            if view.is_button_just_released(button) {
                println!("{button:?} up");
            }
        }

        // Sticks and triggers, throttled to keep the terminal readable
        if last_print.elapsed() >= Duration::from_millis(250) {
            last_print = Instant::now();
            let l = view.left_stick();
            let r = view.right_stick();
            println!(
                "L=({:+.2},{:+.2}) R=({:+.2},{:+.2}) LT={:.2} RT={:.2} devices={}",
                l.x,
                l.y,
                r.x,
                r.y,
                view.left_trigger(),
                view.right_trigger(),
                catalog.device_count()
            );
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}
