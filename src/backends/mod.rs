//! Platform backends.
//!
//! A [`Backend`] is the platform's device-input facility as seen from the bridge
//! thread. It is created on that thread and never leaves it, so implementations
//! do not need to be `Send`. The bridge drives it with short, bounded calls and
//! receives everything the platform reports through a [`PlatformSink`].
//!
//! # Feature flags
//! - **`hid`** enables the `hidapi` backend ([`hid::HidBackend`]).
//!
//! The [`virtual_input`] backend is always available. It delivers plug, unplug and
//! value changes issued through a [`virtual_input::VirtualHub`].

use crate::error::InputError;
use crate::event::{Cookie, DeviceDescriptor, RawHandle};
use std::time::Duration;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod report_descriptor;
pub mod virtual_input;

/// Receiver for platform callbacks. Implemented by the bridge.
///
/// Calls happen on the bridge thread and must stay cheap: they only record a
/// notification or enqueue a raw sample.
pub trait PlatformSink {
    /// A device became visible.
    fn device_added(&mut self, descriptor: DeviceDescriptor);
    /// A device went away (unplugged, read failure, failed open).
    fn device_removed(&mut self, handle: RawHandle);
    /// An input element on an opened device changed value.
    fn value_changed(&mut self, handle: RawHandle, cookie: Cookie, value: i32);
}

/// A platform device-input facility driven by the bridge thread.
pub trait Backend {
    fn name(&self) -> &str;

    /// Bounded discovery pass: report devices that became visible since the last
    /// pass via [`PlatformSink::device_added`] and vanished ones via
    /// [`PlatformSink::device_removed`]. Devices already reported must not be
    /// reported again.
    fn discover(&mut self, sink: &mut dyn PlatformSink);

    /// Open a reported device so that its input values are delivered.
    fn open(&mut self, handle: RawHandle) -> Result<(), InputError>;

    /// Close a device. Closing an unknown or already closed handle is a no-op.
    fn close(&mut self, handle: RawHandle);

    /// Deliver pending input for opened devices, waiting at most `budget` for some
    /// to arrive.
    fn pump(&mut self, budget: Duration, sink: &mut dyn PlatformSink);
}

/// Builds a backend on the bridge thread.
pub type BackendFactory = Box<dyn FnOnce() -> Result<Box<dyn Backend>, InputError> + Send>;

/// Factory for a backend that fails to initialize. Useful for hosts that want the
/// catalog API without any input source, and for exercising the degraded path.
pub fn unavailable(reason: impl Into<String>) -> BackendFactory {
    let reason = reason.into();
    Box::new(move || Err(InputError::PlatformInit(reason)))
}
