//! System-wide constants for the adapter workspace.
//!
//! Single source of truth for numeric limits, default timings and paths.

use static_assertions::const_assert;

/// Maximum number of positioner channels on one controller.
pub const MAX_AXES: usize = 3;

/// Capacity of each identity string buffer (serial, firmware, MAC, ...).
pub const IDENTITY_BUFFER_LEN: usize = 256;

/// Default background poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default interval between in-range checks during a move, in milliseconds.
pub const DEFAULT_MOVE_CHECK_INTERVAL_MS: u64 = 10;

/// Default upper bound on a single move, in milliseconds.
pub const DEFAULT_MOVE_TIMEOUT_MS: u64 = 60_000;

/// Default device driver name.
pub const DEFAULT_DRIVER: &str = "simulation";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/atto/motor.toml";

/// Component name used as logging context for controllers.
pub const CONTROLLER_COMPONENT: &str = "AttocubeController";

/// Component name used as logging context for axes.
pub const AXIS_COMPONENT: &str = "AttocubeAxis";

const_assert!(MAX_AXES > 0);
const_assert!(IDENTITY_BUFFER_LEN >= 64);
const_assert!(DEFAULT_MOVE_CHECK_INTERVAL_MS < DEFAULT_POLL_INTERVAL_MS);
