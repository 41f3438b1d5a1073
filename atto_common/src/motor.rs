//! Host motor-framework contract.
//!
//! This module defines:
//! - `MotorAxis` trait - Per-axis capability set the host dispatches to
//! - `MotorController` trait - Controller-level capability set
//! - `AxisLocator` - Opaque axis address carried by host write requests
//! - `AxisStatusFlags` - Motion status bits published per axis
//! - `MotorError` / `MotorResult` - Error types for motor operations

use crate::config::ConfigError;
use crate::device::DeviceError;
use crate::params::{ParamError, ParamId};
use bitflags::bitflags;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

/// Error types for motor operations.
#[derive(Debug, Clone, Error)]
pub enum MotorError {
    /// Locator resolved to no axis on this controller
    #[error("no axis at address {0}")]
    InvalidAxis(i32),

    /// Move did not reach the target window in time
    #[error("axis {channel} did not reach target within {waited:?}")]
    Timeout {
        /// Channel that was moving
        channel: usize,
        /// How long the move waited
        waited: Duration,
    },

    /// Move wait ended by a stop request or controller teardown
    #[error("move on axis {channel} cancelled")]
    Cancelled {
        /// Channel that was moving
        channel: usize,
    },

    /// Owning controller has been torn down
    #[error("controller is no longer available")]
    ControllerGone,

    /// Hardware command failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Parameter registry failure
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A controller is already registered under this port name
    #[error("port '{0}' is already configured")]
    DuplicatePort(String),

    /// Driver not found
    #[error("driver not found: {0}")]
    DriverNotFound(String),

    /// Background poll thread could not be started
    #[error("failed to start poll loop: {0}")]
    PollThread(String),
}

/// Result alias for motor operations.
pub type MotorResult<T> = Result<T, MotorError>;

bitflags! {
    /// Motion status bits for one axis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AxisStatusFlags: u16 {
        /// Last commanded motion has completed.
        const DONE     = 0x0001;
        /// Axis is approaching its target.
        const MOVING   = 0x0002;
        /// Reference position is valid.
        const HOMED    = 0x0004;
        /// Drive output is enabled.
        const POWER_ON = 0x0008;
        /// Last status read from hardware failed.
        const PROBLEM  = 0x0010;
    }
}

/// Opaque axis address attached to a host write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisLocator {
    addr: i32,
}

impl AxisLocator {
    /// Locator for the given host address.
    pub const fn new(addr: i32) -> Self {
        Self { addr }
    }

    /// Raw host address.
    pub const fn addr(&self) -> i32 {
        self.addr
    }

    /// Channel index, if the address can name one.
    pub fn channel(&self) -> Option<usize> {
        usize::try_from(self.addr).ok()
    }
}

/// Per-axis operations the host framework dispatches to.
///
/// The host holds axes only through this trait. Velocity and acceleration
/// arguments follow the host's calling convention; drivers may ignore them.
pub trait MotorAxis: Send + Sync {
    /// Channel number of this axis.
    fn channel(&self) -> usize;

    /// Move to `position` (absolute) or by `position` (relative).
    ///
    /// Blocks until the device reports the target in range.
    fn move_to(
        &self,
        position: f64,
        relative: bool,
        min_velocity: f64,
        max_velocity: f64,
        acceleration: f64,
    ) -> MotorResult<()>;

    /// Stop any motion on this axis.
    fn stop(&self, acceleration: f64) -> MotorResult<()>;

    /// Start a reference search.
    fn home(
        &self,
        min_velocity: f64,
        max_velocity: f64,
        acceleration: f64,
        forwards: bool,
    ) -> MotorResult<()>;

    /// Refresh cached status. Returns the moving flag.
    fn poll(&self) -> MotorResult<bool>;

    /// Write a diagnostic description. Never fails the caller.
    fn report(&self, out: &mut dyn Write, level: u32);
}

/// Controller-level operations the host framework dispatches to.
pub trait MotorController: Send + Sync {
    /// Handle an integer parameter write addressed to one axis.
    ///
    /// # Errors
    /// Returns `MotorError::InvalidAxis` if the locator matches no axis, and
    /// `MotorError::Param` if the value cannot be stored in the cache (unknown
    /// id or type mismatch). Either way nothing is cached or sent. Once the
    /// value is cached, a failed device write is only logged and `Ok` is
    /// returned.
    fn write_integer(&self, locator: AxisLocator, param: ParamId, value: i32) -> MotorResult<()>;

    /// Axis at `index`, if it exists.
    fn axis(&self, index: usize) -> Option<&dyn MotorAxis>;

    /// Write a diagnostic description. Never fails the caller.
    fn report(&self, out: &mut dyn Write, level: u32);
}
