use crate::device::Device;
use crate::eventbus::{BusEvent, InputListener};

/// Wraps a listener and forwards only events whose device passes a predicate.
pub struct FilteredListener {
    predicate: Box<dyn Fn(&Device) -> bool + Send + Sync>,
    inner: Box<dyn InputListener>,
}

impl FilteredListener {
    pub fn new(
        predicate: impl Fn(&Device) -> bool + Send + Sync + 'static,
        inner: Box<dyn InputListener>,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }

    /// Only devices with this USB vendor/product pair.
    pub fn for_product(vendor_id: u16, product_id: u16, inner: Box<dyn InputListener>) -> Self {
        Self::new(
            move |d| d.vendor_id == vendor_id && d.product_id == product_id,
            inner,
        )
    }

    fn forward(&mut self, event: BusEvent<'_>) {
        if (self.predicate)(event.device()) {
            event.deliver(self.inner.as_mut());
        }
    }
}

impl InputListener for FilteredListener {
    fn on_attached(&mut self, device: &Device) {
        self.forward(BusEvent::Attached(device));
    }

    fn on_detached(&mut self, device: &Device) {
        self.forward(BusEvent::Detached(device));
    }

    fn on_button_pressed(&mut self, device: &Device, button_id: u16) {
        self.forward(BusEvent::Button {
            device,
            button_id,
            pressed: true,
        });
    }

    fn on_button_released(&mut self, device: &Device, button_id: u16) {
        self.forward(BusEvent::Button {
            device,
            button_id,
            pressed: false,
        });
    }

    fn on_axis_moved(&mut self, device: &Device, axis_id: u16, value: f32, raw: i32) {
        self.forward(BusEvent::Axis {
            device,
            axis_id,
            value,
            raw,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventbus::tests::{device, Recorder};

    #[test]
    fn forwards_matching_devices_only() {
        let rec = Recorder::default();
        let mut filtered = FilteredListener::new(|d| d.device_id.0 == 1, Box::new(rec.clone()));

        filtered.on_button_pressed(&device(0), 4);
        filtered.on_button_pressed(&device(1), 4);
        filtered.on_axis_moved(&device(1), 2, -1.0, 0);

        assert_eq!(rec.take(), vec!["press dev1 4", "axis dev1 2 -1 0"]);
    }

    #[test]
    fn product_filter() {
        let rec = Recorder::default();
        let mut filtered = FilteredListener::for_product(0x045e, 0x028e, Box::new(rec.clone()));
        let mut pad = device(3);
        filtered.on_attached(&pad);
        pad.vendor_id = 0x045e;
        pad.product_id = 0x028e;
        filtered.on_attached(&pad);
        assert_eq!(rec.take(), vec!["attach dev3"]);
    }
}
