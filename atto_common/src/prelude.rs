//! Prelude module for common re-exports.
//!
//! ```rust
//! use atto_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{IDENTITY_BUFFER_LEN, MAX_AXES};

// ─── Device ─────────────────────────────────────────────────────────
pub use crate::device::{
    DeviceConnector, DeviceError, DeviceHandle, DeviceResult, IdentityField, IdentitySnapshot,
    IdentityString,
};

// ─── Host framework ─────────────────────────────────────────────────
pub use crate::motor::{
    AxisLocator, AxisStatusFlags, MotorAxis, MotorController, MotorError, MotorResult,
};
pub use crate::params::{ParamId, ParamRegistry, ParamScope, ParamType, ParamUpdate, ParamValue};
