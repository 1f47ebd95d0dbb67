//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all) is a
//! valid configuration:
//!
//! ```
//! use padhub::InputConfig;
//!
//! let cfg = InputConfig::from_toml_str("scan_interval_ms = 250").unwrap();
//! assert_eq!(cfg.scan_interval_ms, 250);
//! assert_eq!(cfg.queue_capacity, 1024);
//! ```

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// How often `tick()` asks the platform for newly visible devices.
    pub scan_interval_ms: u64,
    /// Minimum spacing between two queue drains.
    pub tick_interval_ms: u64,
    /// Capacity of the raw event queue before it is cleared.
    pub queue_capacity: usize,
    /// How long starting the bridge may wait for the event loop to come up.
    pub ready_timeout_ms: u64,
    /// Upper bound on one blocking pump of the platform event loop.
    pub poll_interval_ms: u64,
    /// Secondary deadzone applied to stick axes after calibration.
    pub stick_deadzone: f32,
    /// Trigger values within this distance of -1 snap to fully released.
    pub trigger_floor: f32,
    /// Release a removed device's buttons and zero the axes it last wrote.
    pub clear_on_detach: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1000,
            tick_interval_ms: 5,
            queue_capacity: crate::queue::DEFAULT_CAPACITY,
            ready_timeout_ms: 2000,
            poll_interval_ms: 4,
            stick_deadzone: 0.07,
            trigger_floor: 0.01,
            clear_on_detach: true,
        }
    }
}

impl InputConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, InputError> {
        let cfg: InputConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        debug!("Loading input config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), InputError> {
        if self.queue_capacity == 0 {
            return Err(InputError::Config("queue_capacity must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.stick_deadzone) {
            return Err(InputError::Config(format!(
                "stick_deadzone must be in [0, 1), got {}",
                self.stick_deadzone
            )));
        }
        if !(0.0..1.0).contains(&self.trigger_floor) {
            return Err(InputError::Config(format!(
                "trigger_floor must be in [0, 1), got {}",
                self.trigger_floor
            )));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
