//! `hidapi` backend.
//!
//! Discovery enumerates HID devices, keeps game controllers (Generic Desktop
//! joystick / gamepad / multi-axis collections), fetches each new device's report
//! descriptor and parses it with [`ReportLayout`]. Opened devices are read in
//! non-blocking mode; every field whose value differs from the previous report is
//! delivered as one `value_changed` callback.
//!
//! This module does **not** apply calibration. Values are raw hardware units,
//! except hats, which are standardized to slots (see
//! [`report_descriptor`](super::report_descriptor)).

use super::report_descriptor::ReportLayout;
use super::{Backend, PlatformSink};
use crate::error::InputError;
use crate::event::{Cookie, DeviceDescriptor, RawHandle};
use crate::metadata::DeviceMeta;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::collections::{HashMap, HashSet};
use std::ffi::CString;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Maximum number of reports drained from one device per pump pass.
///
/// Prevents a single chatty device from starving the others.
const MAX_REPORTS_PER_TICK: usize = 32;

/// Upper bound on a HID report descriptor (HID_API_MAX_REPORT_DESCRIPTOR_SIZE).
const MAX_DESCRIPTOR_LEN: usize = 4096;

const PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_JOYSTICK: u16 = 0x04;
const USAGE_GAMEPAD: u16 = 0x05;
const USAGE_MULTI_AXIS: u16 = 0x08;

struct KnownDevice {
    path: CString,
    layout: ReportLayout,
}

struct OpenDevice {
    raw: HidDevice,
    buf: Vec<u8>,
    last: HashMap<Cookie, i32>,
}

pub struct HidBackend {
    api: HidApi,
    next_handle: RawHandle,
    handles_by_path: HashMap<CString, RawHandle>,
    known: HashMap<RawHandle, KnownDevice>,
    open: HashMap<RawHandle, OpenDevice>,
    /// Paths whose descriptor could not be used; not retried until they vanish.
    rejected: HashSet<CString>,
}

impl HidBackend {
    pub fn new() -> Result<Self, InputError> {
        let api = HidApi::new()?;
        info!("hidapi session opened");
        Ok(Self {
            api,
            next_handle: 1,
            handles_by_path: HashMap::new(),
            known: HashMap::new(),
            open: HashMap::new(),
            rejected: HashSet::new(),
        })
    }

    /// Factory for [`DeviceCatalog::new`](crate::DeviceCatalog::new).
    pub fn factory() -> super::BackendFactory {
        Box::new(|| Ok(Box::new(HidBackend::new()?) as Box<dyn Backend>))
    }

    fn read_layout(&self, info: &DeviceInfo) -> Result<ReportLayout, String> {
        let dev = info.open_device(&self.api).map_err(|e| e.to_string())?;
        let mut buf = vec![0u8; MAX_DESCRIPTOR_LEN];
        let n = dev
            .get_report_descriptor(&mut buf)
            .map_err(|e| e.to_string())?;
        ReportLayout::parse(&buf[..n])
    }

    fn forget(&mut self, handle: RawHandle) {
        self.open.remove(&handle);
        if let Some(known) = self.known.remove(&handle) {
            self.handles_by_path.remove(&known.path);
        }
    }
}

/// Keep game controllers; drop keyboards, mice and everything else.
fn accept_device(info: &DeviceInfo) -> bool {
    info.usage_page() == PAGE_GENERIC_DESKTOP
        && matches!(
            info.usage(),
            USAGE_JOYSTICK | USAGE_GAMEPAD | USAGE_MULTI_AXIS
        )
}

fn meta(info: &DeviceInfo) -> DeviceMeta {
    DeviceMeta {
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        product_string: info.product_string().map(|s| s.to_string()),
        serial_number: info.serial_number().map(|s| s.to_string()),
        usage_page: Some(info.usage_page()),
        usage: Some(info.usage()),
        path: Some(info.path().to_string_lossy().to_string()),
    }
}

impl Backend for HidBackend {
    fn name(&self) -> &str {
        "hidapi"
    }

    fn discover(&mut self, sink: &mut dyn PlatformSink) {
        if let Err(e) = self.api.refresh_devices() {
            warn!("HID refresh failed: {e}");
            return;
        }

        let candidates: Vec<(CString, DeviceMeta)> = self
            .api
            .device_list()
            .filter(|info| accept_device(info))
            .map(|info| (info.path().to_owned(), meta(info)))
            .collect();
        let visible: HashSet<&CString> = candidates.iter().map(|(p, _)| p).collect();

        let gone: Vec<RawHandle> = self
            .known
            .iter()
            .filter(|(_, k)| !visible.contains(&k.path))
            .map(|(h, _)| *h)
            .collect();
        self.rejected.retain(|p| visible.contains(p));
        drop(visible);

        for handle in gone {
            debug!("HID device {handle} vanished");
            self.forget(handle);
            sink.device_removed(handle);
        }

        for (path, meta) in candidates {
            if self.handles_by_path.contains_key(&path) || self.rejected.contains(&path) {
                continue;
            }
            let Some(info) = self.api.device_list().find(|i| i.path() == path.as_c_str()) else {
                continue;
            };
            let layout = match self.read_layout(info) {
                Ok(layout) if !layout.fields.is_empty() => layout,
                Ok(_) => {
                    debug!("Skipping {meta}: no input fields");
                    self.rejected.insert(path);
                    continue;
                }
                Err(reason) => {
                    warn!("Skipping {meta}: unusable report descriptor ({reason})");
                    self.rejected.insert(path);
                    continue;
                }
            };

            let handle = self.next_handle;
            self.next_handle += 1;
            let descriptor = DeviceDescriptor {
                handle,
                meta,
                elements: layout.elements(),
            };
            self.handles_by_path.insert(path.clone(), handle);
            self.known.insert(handle, KnownDevice { path, layout });
            sink.device_added(descriptor);
        }
    }

    fn open(&mut self, handle: RawHandle) -> Result<(), InputError> {
        let known = self.known.get(&handle).ok_or_else(|| InputError::DeviceOpen {
            handle,
            reason: "unknown handle".into(),
        })?;
        let raw = self
            .api
            .open_path(&known.path)
            .map_err(|e| InputError::DeviceOpen {
                handle,
                reason: e.to_string(),
            })?;
        // Pump polls every device in turn, so reads must not block.
        if let Err(e) = raw.set_blocking_mode(false) {
            debug!("set_blocking_mode failed for {handle}: {e}");
        }
        let buf = vec![0u8; known.layout.max_report_len().max(64)];
        self.open.insert(
            handle,
            OpenDevice {
                raw,
                buf,
                last: HashMap::new(),
            },
        );
        Ok(())
    }

    fn close(&mut self, handle: RawHandle) {
        if self.open.remove(&handle).is_some() {
            debug!("Closed HID device {handle}");
        }
    }

    fn pump(&mut self, budget: Duration, sink: &mut dyn PlatformSink) {
        let deadline = Instant::now() + budget;
        loop {
            let mut any = false;
            let mut failed = Vec::new();

            for (&handle, dev) in self.open.iter_mut() {
                let Some(known) = self.known.get(&handle) else {
                    continue;
                };
                for _ in 0..MAX_REPORTS_PER_TICK {
                    match dev.raw.read(&mut dev.buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            any = true;
                            let (rid, payload) = known.layout.split(&dev.buf[..n]);
                            for field in known.layout.fields_for(rid) {
                                let Some(raw) = field.extract(payload) else {
                                    continue;
                                };
                                let value = field.published(raw);
                                if dev.last.insert(field.cookie, value) != Some(value) {
                                    sink.value_changed(handle, field.cookie, value);
                                }
                            }
                        }
                        Err(e) => {
                            warn!("HID device {handle} read failed: {e}");
                            failed.push(handle);
                            break;
                        }
                    }
                }
            }

            for handle in failed {
                self.forget(handle);
                sink.device_removed(handle);
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if !any {
                trace!("HID pump idle");
                std::thread::sleep((deadline - now).min(Duration::from_millis(1)));
            }
        }
    }
}
