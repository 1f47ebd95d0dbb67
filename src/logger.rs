use crate::device::Device;
use crate::eventbus::InputListener;
use tracing::{debug, info, trace};

/// A listener that logs every hook through `tracing`.
///
/// Attach and detach go to `info`, buttons to `debug`, axis motion to `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl LogListener {
    pub fn new() -> Self {
        LogListener
    }
}

impl InputListener for LogListener {
    fn on_attached(&mut self, device: &Device) {
        info!(
            "[Input] attached {} {} ({:04x}:{:04x}), {} axes, {} buttons",
            device.device_id,
            device.description,
            device.vendor_id,
            device.product_id,
            device.axes.len(),
            device.buttons.len()
        );
    }

    fn on_detached(&mut self, device: &Device) {
        info!("[Input] detached {} {}", device.device_id, device.description);
    }

    fn on_button_pressed(&mut self, device: &Device, button_id: u16) {
        debug!("[Input] {} button {button_id} pressed", device.device_id);
    }

    fn on_button_released(&mut self, device: &Device, button_id: u16) {
        debug!("[Input] {} button {button_id} released", device.device_id);
    }

    fn on_axis_moved(&mut self, device: &Device, axis_id: u16, value: f32, raw: i32) {
        trace!(
            "[Input] {} axis {axis_id} = {value:.3} (raw {raw})",
            device.device_id
        );
    }
}
