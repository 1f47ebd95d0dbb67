//! Background event bridge.
//!
//! [`EventBridge`] owns the one thread that talks to the platform. The thread
//! builds the [`Backend`] itself (backends are not `Send`), then loops:
//!
//! 1. apply every queued [`Command`] (scan, open, close, barrier),
//! 2. pump the backend for at most `poll_interval`,
//! 3. acknowledge barriers received in step 1.
//!
//! Platform callbacks land in a [`PlatformSink`] that only records attach/detach
//! notifications and pushes tagged [`RawEvent`]s into the shared [`EventQueue`].
//! The application thread picks both up in `DeviceCatalog::tick`.
//!
//! Start-up is lazy and happens at most once. The starter waits for the thread's
//! readiness signal with a bounded timeout; a backend that fails to initialize
//! leaves the bridge in a failed state and the subsystem reports no devices.

use crate::backends::{Backend, BackendFactory, PlatformSink};
use crate::config::InputConfig;
use crate::device::CookieMap;
use crate::error::InputError;
use crate::event::{Cookie, DeviceDescriptor, DeviceId, RawEvent, RawHandle, RawKind};
use crate::queue::EventQueue;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Application → bridge requests.
pub(crate) enum Command {
    Scan,
    Open {
        handle: RawHandle,
        device_id: DeviceId,
        cookies: Arc<CookieMap>,
    },
    Close {
        handle: RawHandle,
    },
    /// Answered after the next pump pass.
    Barrier(Sender<()>),
    Shutdown,
}

/// Attach/detach notifications recorded on the bridge thread, consumed by `tick`.
#[derive(Debug, Default)]
pub struct PendingNotifications {
    pub attached: Vec<DeviceDescriptor>,
    pub detached: Vec<RawHandle>,
}

impl PendingNotifications {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

type Readiness = Arc<(Mutex<Option<Result<(), String>>>, Condvar)>;

enum BridgeState {
    Idle,
    Running {
        commands: Sender<Command>,
        thread: JoinHandle<()>,
    },
    Failed,
    Stopped,
}

pub struct EventBridge {
    factory: Option<BackendFactory>,
    state: BridgeState,
    queue: Arc<EventQueue>,
    pending: Arc<Mutex<PendingNotifications>>,
    cancel: Arc<AtomicBool>,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl EventBridge {
    pub fn new(factory: BackendFactory, config: &InputConfig) -> Self {
        Self {
            factory: Some(factory),
            state: BridgeState::Idle,
            queue: Arc::new(EventQueue::with_capacity(config.queue_capacity)),
            pending: Arc::new(Mutex::new(PendingNotifications::default())),
            cancel: Arc::new(AtomicBool::new(false)),
            ready_timeout: config.ready_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, BridgeState::Running { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, BridgeState::Failed)
    }

    /// Start the bridge thread if it has never been started.
    ///
    /// Returns whether the bridge is running afterwards. A failed or stopped
    /// bridge is never restarted.
    pub fn ensure_started(&mut self) -> bool {
        if matches!(self.state, BridgeState::Idle) {
            self.state = self.start();
        }
        self.is_running()
    }

    fn start(&mut self) -> BridgeState {
        let Some(factory) = self.factory.take() else {
            return BridgeState::Failed;
        };

        let (tx, rx) = unbounded();
        let ready: Readiness = Arc::new((Mutex::new(None), Condvar::new()));
        let worker = Worker {
            rx,
            queue: Arc::clone(&self.queue),
            pending: Arc::clone(&self.pending),
            cancel: Arc::clone(&self.cancel),
            poll_interval: self.poll_interval,
        };

        let spawned = {
            let ready = Arc::clone(&ready);
            std::thread::Builder::new()
                .name("padhub-bridge".into())
                .spawn(move || worker.run(factory, ready))
        };
        let thread = match spawned {
            Ok(t) => t,
            Err(e) => {
                error!("{}", InputError::PlatformInit(e.to_string()));
                return BridgeState::Failed;
            }
        };

        let outcome = {
            let (lock, cvar) = &*ready;
            let mut guard = lock.lock();
            cvar.wait_while_for(&mut guard, |r| r.is_none(), self.ready_timeout);
            guard.take()
        };

        match outcome {
            Some(Ok(())) => BridgeState::Running {
                commands: tx,
                thread,
            },
            Some(Err(reason)) => {
                error!("{}; continuing without input devices", InputError::PlatformInit(reason));
                let _ = thread.join();
                BridgeState::Failed
            }
            None => {
                // Still coming up. Commands queue in the channel meanwhile.
                warn!(
                    "Input bridge not ready after {:?}; continuing",
                    self.ready_timeout
                );
                BridgeState::Running {
                    commands: tx,
                    thread,
                }
            }
        }
    }

    fn send(&mut self, cmd: Command) -> bool {
        let BridgeState::Running { commands, .. } = &self.state else {
            return false;
        };
        if commands.send(cmd).is_ok() {
            return true;
        }
        // The thread is gone; either the backend failed late or it panicked.
        if let BridgeState::Running { thread, .. } =
            std::mem::replace(&mut self.state, BridgeState::Failed)
        {
            if thread.join().is_err() {
                error!("Input bridge thread panicked");
            }
        }
        false
    }

    /// Ask the platform for newly visible devices.
    pub fn request_scan(&mut self) {
        if self.ensure_started() {
            self.send(Command::Scan);
        }
    }

    /// Open a device and register its cookie map for input tagging.
    ///
    /// If the request cannot be delivered the handle is reported detached, so the
    /// catalog reaps the device at its next tick.
    pub fn open(&mut self, handle: RawHandle, device_id: DeviceId, cookies: Arc<CookieMap>) {
        let sent = self.ensure_started()
            && self.send(Command::Open {
                handle,
                device_id,
                cookies,
            });
        if !sent {
            debug!("Cannot open {handle}: input bridge is not running");
            self.pending.lock().detached.push(handle);
        }
    }

    pub fn close(&mut self, handle: RawHandle) {
        self.send(Command::Close { handle });
    }

    /// Block until the bridge has applied every earlier command and completed one
    /// pump pass, or until `timeout`. Returns `false` on timeout or if the bridge
    /// is not running.
    pub fn sync(&mut self, timeout: Duration) -> bool {
        let (tx, rx) = bounded(1);
        self.send(Command::Barrier(tx)) && rx.recv_timeout(timeout).is_ok()
    }

    /// Take all attach/detach notifications recorded since the last call.
    pub fn take_pending(&self) -> PendingNotifications {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Stop and join the bridge thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let BridgeState::Running { commands, thread } =
            std::mem::replace(&mut self.state, BridgeState::Stopped)
        {
            let _ = commands.send(Command::Shutdown);
            if thread.join().is_err() {
                error!("Input bridge thread panicked");
            }
            info!("Input bridge stopped");
        }
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Registration {
    device_id: DeviceId,
    cookies: Arc<CookieMap>,
}

/// Everything the bridge thread owns.
struct Worker {
    rx: Receiver<Command>,
    queue: Arc<EventQueue>,
    pending: Arc<Mutex<PendingNotifications>>,
    cancel: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Worker {
    fn run(self, factory: BackendFactory, ready: Readiness) {
        let signal = |outcome: Result<(), String>| {
            let (lock, cvar) = &*ready;
            *lock.lock() = Some(outcome);
            cvar.notify_all();
        };

        let mut backend = match factory() {
            Ok(b) => {
                signal(Ok(()));
                b
            }
            Err(e) => {
                let reason = match e {
                    InputError::PlatformInit(reason) => reason,
                    other => other.to_string(),
                };
                signal(Err(reason));
                return;
            }
        };
        info!("Input bridge running on the {} backend", backend.name());

        let mut registry: HashMap<RawHandle, Registration> = HashMap::new();
        let mut barriers: Vec<Sender<()>> = Vec::new();

        'run: while !self.cancel.load(Ordering::Acquire) {
            loop {
                match self.rx.try_recv() {
                    Ok(Command::Scan) => {
                        let removed = self.with_sink(&registry, |sink| backend.discover(sink));
                        forget(&mut registry, removed);
                    }
                    Ok(Command::Open {
                        handle,
                        device_id,
                        cookies,
                    }) => match backend.open(handle) {
                        Ok(()) => {
                            debug!("Opened {handle} as {device_id}");
                            registry.insert(handle, Registration { device_id, cookies });
                        }
                        Err(e) => {
                            warn!("{e}");
                            self.pending.lock().detached.push(handle);
                        }
                    },
                    Ok(Command::Close { handle }) => {
                        registry.remove(&handle);
                        backend.close(handle);
                    }
                    Ok(Command::Barrier(reply)) => barriers.push(reply),
                    Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => break 'run,
                    Err(TryRecvError::Empty) => break,
                }
            }

            let budget = self.poll_interval;
            let removed = self.with_sink(&registry, |sink| backend.pump(budget, sink));
            forget(&mut registry, removed);

            for reply in barriers.drain(..) {
                let _ = reply.send(());
            }
        }

        for handle in registry.keys() {
            backend.close(*handle);
        }
        debug!("Input bridge loop exited");
    }

    /// Run one backend call against a fresh sink; returns the handles it removed.
    fn with_sink(
        &self,
        registry: &HashMap<RawHandle, Registration>,
        call: impl FnOnce(&mut dyn PlatformSink),
    ) -> Vec<RawHandle> {
        let mut sink = BridgeSink {
            registry,
            queue: &self.queue,
            pending: &self.pending,
            removed: Vec::new(),
        };
        call(&mut sink);
        sink.removed
    }
}

fn forget(registry: &mut HashMap<RawHandle, Registration>, removed: Vec<RawHandle>) {
    for handle in removed {
        registry.remove(&handle);
    }
}

struct BridgeSink<'a> {
    registry: &'a HashMap<RawHandle, Registration>,
    queue: &'a EventQueue,
    pending: &'a Mutex<PendingNotifications>,
    removed: Vec<RawHandle>,
}

impl PlatformSink for BridgeSink<'_> {
    fn device_added(&mut self, descriptor: DeviceDescriptor) {
        debug!("Platform reported device {} ({})", descriptor.handle, descriptor.meta);
        self.pending.lock().attached.push(descriptor);
    }

    fn device_removed(&mut self, handle: RawHandle) {
        debug!("Platform removed device {handle}");
        let mut pending = self.pending.lock();
        let before = pending.attached.len();
        pending.attached.retain(|d| d.handle != handle);
        if pending.attached.len() == before {
            // Not a device the catalog has yet to see.
            pending.detached.push(handle);
        }
        self.removed.push(handle);
    }

    fn value_changed(&mut self, handle: RawHandle, cookie: Cookie, value: i32) {
        let target = self
            .registry
            .get(&handle)
            .and_then(|reg| Some((reg.device_id, reg.cookies.get(cookie)?.target()?)));
        match target {
            Some((device, (RawKind::Axis, id))) => {
                self.queue.push(RawEvent::axis(device, id, value));
            }
            Some((device, (RawKind::Button, id))) => {
                self.queue.push(RawEvent::button(device, id, value));
            }
            None => trace!("{}", InputError::UnknownElement { handle, cookie }),
        }
    }
}
