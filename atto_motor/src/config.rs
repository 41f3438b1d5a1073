//! Adapter configuration loaded from TOML.
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "atto-motor"
//!
//! [[controllers]]
//! port_name = "AMC1"
//! address = "192.168.1.50"
//! axis_count = 3
//! ```

use crate::controller::ControllerTiming;
use atto_common::config::{ConfigError, SharedConfig};
use atto_common::consts::{
    DEFAULT_DRIVER, DEFAULT_MOVE_CHECK_INTERVAL_MS, DEFAULT_MOVE_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, MAX_AXES,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_move_check_interval_ms() -> u64 {
    DEFAULT_MOVE_CHECK_INTERVAL_MS
}

fn default_move_timeout_ms() -> u64 {
    DEFAULT_MOVE_TIMEOUT_MS
}

/// One `[[controllers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Host port name the controller registers under.
    pub port_name: String,

    /// Network address of the device.
    pub address: String,

    /// Number of channels to bring up (1..=MAX_AXES).
    pub axis_count: usize,

    /// Device driver name. Defaults to "simulation".
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Interval between poll cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between in-range checks during a move.
    #[serde(default = "default_move_check_interval_ms")]
    pub move_check_interval_ms: u64,

    /// Upper bound on a single move.
    #[serde(default = "default_move_timeout_ms")]
    pub move_timeout_ms: u64,
}

impl ControllerConfig {
    /// Config with default driver and timings.
    pub fn new(port_name: &str, address: &str, axis_count: usize) -> Self {
        Self {
            port_name: port_name.to_string(),
            address: address.to_string(),
            axis_count,
            driver: default_driver(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            move_check_interval_ms: DEFAULT_MOVE_CHECK_INTERVAL_MS,
            move_timeout_ms: DEFAULT_MOVE_TIMEOUT_MS,
        }
    }

    /// Validate the controller entry.
    ///
    /// # Validation Rules
    /// 1. `port_name` and `address` non-empty
    /// 2. `1 <= axis_count <= MAX_AXES`
    /// 3. All intervals > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "port_name cannot be empty".to_string(),
            ));
        }
        if self.address.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{}: address cannot be empty",
                self.port_name
            )));
        }
        if self.axis_count == 0 || self.axis_count > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "{}: axis_count must be 1..={} (got {})",
                self.port_name, MAX_AXES, self.axis_count
            )));
        }
        if self.poll_interval_ms == 0 || self.move_check_interval_ms == 0 || self.move_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{}: intervals must be greater than 0",
                self.port_name
            )));
        }
        Ok(())
    }

    /// Timing as durations.
    pub fn timing(&self) -> ControllerTiming {
        ControllerTiming {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            move_check_interval: Duration::from_millis(self.move_check_interval_ms),
            move_timeout: Duration::from_millis(self.move_timeout_ms),
        }
    }
}

/// Top-level adapter configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Logging level and service name.
    pub shared: SharedConfig,

    /// Controllers to configure, in order.
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

impl AdapterConfig {
    /// Validate shared settings, every controller, and port-name uniqueness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let mut ports = HashSet::new();
        for controller in &self.controllers {
            controller.validate()?;
            if !ports.insert(controller.port_name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate port name: {}",
                    controller.port_name
                )));
            }
        }
        Ok(())
    }
}
