//! Hot-plug gamepad/HID input.
//!
//! A background bridge thread receives platform callbacks (device added,
//! removed, element value changed) and hands raw samples to the application
//! through a bounded queue. [`DeviceCatalog::tick`] drains that queue on the
//! application thread, calibrates each sample against the ranges the device
//! declared when it was attached, and folds everything into one
//! [`GamepadState`] shared by all controllers.
//!
//! ```no_run
//! # #[cfg(feature = "hid")]
//! # fn main() {
//! use padhub::{DeviceCatalog, GamepadButton};
//!
//! let mut catalog = DeviceCatalog::discover();
//! loop {
//!     catalog.tick();
//!     let state = catalog.state();
//!     if state.is_button_pressed(GamepadButton::Start) {
//!         break;
//!     }
//!     println!("left stick {:?}", state.left_stick());
//!     std::thread::sleep(std::time::Duration::from_millis(5));
//! }
//! # }
//! # #[cfg(not(feature = "hid"))]
//! # fn main() {}
//! ```
//!
//! Backends live in [`backends`]: `hid` (feature `hid`, over `hidapi`) and
//! [`virtual_input`](backends::virtual_input), which is driven from code.

pub mod aggregator;
pub mod backends;
pub mod bridge;
pub mod calibration;
pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod filtered_listener;
pub mod logger;
pub mod metadata;
pub mod queue;
pub mod snapshot;

pub use aggregator::{GamepadAxis, GamepadButton, GamepadState, StateAggregator, Vec2};
pub use catalog::DeviceCatalog;
pub use config::InputConfig;
pub use device::*;
pub use error::InputError;
pub use event::*;
pub use eventbus::{BusEvent, EventFilter, InputListener, ListenerBus};
pub use filtered_listener::FilteredListener;
pub use logger::LogListener;
pub use metadata::DeviceMeta;
pub use snapshot::{GamepadSnapshot, GamepadView};
