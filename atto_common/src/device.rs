//! Device handle contract.
//!
//! This module defines the boundary to the vendor transport:
//! - `DeviceConnector` - Opens a connection to one controller by address
//! - `DeviceHandle` - Per-channel get/set primitives on an open connection
//! - `IdentityField` / `IdentitySnapshot` - Descriptive strings read once after connect
//! - `DeviceError` - Error types for transport operations
//!
//! The network protocol itself lives behind these traits; the adapter only
//! ever talks to a `Box<dyn DeviceHandle>`.

use crate::consts::IDENTITY_BUFFER_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed-capacity string returned by identity getters.
pub type IdentityString = heapless::String<IDENTITY_BUFFER_LEN>;

/// Error types for device transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Connect was refused or timed out
    #[error("failed to connect to {address} (code {code})")]
    ConnectionFailed {
        /// Address that was dialled
        address: String,
        /// Vendor result code
        code: i32,
    },

    /// No open connection behind this handle
    #[error("device not connected")]
    NotConnected,

    /// A single get/set call returned a non-zero result
    #[error("{op} failed on channel {channel} (code {code})")]
    Command {
        /// Primitive that failed
        op: &'static str,
        /// Channel the call addressed
        channel: usize,
        /// Vendor result code
        code: i32,
    },

    /// Channel index outside the controller's range
    #[error("invalid channel {0}")]
    InvalidChannel(usize),
}

/// Result alias for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// The six descriptive strings a controller reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityField {
    /// Controller serial number
    SerialNumber,
    /// User-assigned device name
    DeviceName,
    /// Firmware version string
    FirmwareVersion,
    /// Network hostname
    Hostname,
    /// Current IP address
    IpAddress,
    /// Hardware MAC address
    MacAddress,
}

impl IdentityField {
    /// All fields, in the order they are fetched after connect.
    pub const ALL: [IdentityField; 6] = [
        IdentityField::SerialNumber,
        IdentityField::FirmwareVersion,
        IdentityField::Hostname,
        IdentityField::DeviceName,
        IdentityField::IpAddress,
        IdentityField::MacAddress,
    ];

    /// Stable parameter key published to the host.
    pub const fn param_key(self) -> &'static str {
        match self {
            IdentityField::SerialNumber => "ATTOCUBE_SERIAL",
            IdentityField::DeviceName => "ATTOCUBE_DEV_NAME",
            IdentityField::FirmwareVersion => "ATTOCUBE_FIRMWARE",
            IdentityField::Hostname => "ATTOCUBE_HOSTNAME",
            IdentityField::IpAddress => "ATTOCUBE_IP",
            IdentityField::MacAddress => "ATTOCUBE_MAC",
        }
    }
}

/// Identity strings captured once after a successful connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    /// Controller serial number
    pub serial_number: IdentityString,
    /// User-assigned device name
    pub device_name: IdentityString,
    /// Firmware version string
    pub firmware_version: IdentityString,
    /// Network hostname
    pub hostname: IdentityString,
    /// Current IP address
    pub ip_address: IdentityString,
    /// Hardware MAC address
    pub mac_address: IdentityString,
}

impl IdentitySnapshot {
    /// Read every identity field from the device.
    ///
    /// Best-effort: a field whose getter fails is left empty, exactly like a
    /// field the device reported as empty.
    pub fn capture(device: &mut dyn DeviceHandle) -> Self {
        let mut snapshot = Self::default();
        for field in IdentityField::ALL {
            match device.identity(field) {
                Ok(value) => *snapshot.field_mut(field) = value,
                Err(e) => tracing::debug!(?field, error = %e, "identity fetch failed"),
            }
        }
        snapshot
    }

    /// Value of one field.
    pub fn get(&self, field: IdentityField) -> &str {
        match field {
            IdentityField::SerialNumber => self.serial_number.as_str(),
            IdentityField::DeviceName => self.device_name.as_str(),
            IdentityField::FirmwareVersion => self.firmware_version.as_str(),
            IdentityField::Hostname => self.hostname.as_str(),
            IdentityField::IpAddress => self.ip_address.as_str(),
            IdentityField::MacAddress => self.mac_address.as_str(),
        }
    }

    fn field_mut(&mut self, field: IdentityField) -> &mut IdentityString {
        match field {
            IdentityField::SerialNumber => &mut self.serial_number,
            IdentityField::DeviceName => &mut self.device_name,
            IdentityField::FirmwareVersion => &mut self.firmware_version,
            IdentityField::Hostname => &mut self.hostname,
            IdentityField::IpAddress => &mut self.ip_address,
            IdentityField::MacAddress => &mut self.mac_address,
        }
    }
}

/// Copy `value` into a fixed-capacity identity buffer, truncating at a char
/// boundary if it does not fit.
pub fn identity_string(value: &str) -> IdentityString {
    let mut out = IdentityString::new();
    for c in value.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Opens connections to controllers.
///
/// One connector is created per driver; `connect` is called once per
/// configured controller.
pub trait DeviceConnector: Send + Sync {
    /// Returns the driver's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Open a connection to the controller at `address`.
    ///
    /// # Errors
    /// Returns `DeviceError::ConnectionFailed` if the controller cannot be reached.
    fn connect(&self, address: &str) -> DeviceResult<Box<dyn DeviceHandle>>;
}

/// Per-channel primitives on an open controller connection.
///
/// Channels are 0-indexed. Every call may fail independently; callers decide
/// whether a failure is surfaced or handled best-effort.
pub trait DeviceHandle: Send {
    /// Close the connection.
    fn disconnect(&mut self) -> DeviceResult<()>;

    /// Current actuator position in device units.
    fn position(&mut self, channel: usize) -> DeviceResult<f64>;

    /// Set the closed-loop target position.
    fn set_target_position(&mut self, channel: usize, target: f64) -> DeviceResult<()>;

    /// Enable or disable approach to the target position.
    fn set_move_enabled(&mut self, channel: usize, enable: bool) -> DeviceResult<()>;

    /// True when the actuator is within tolerance of its target.
    fn target_in_range(&mut self, channel: usize) -> DeviceResult<bool>;

    /// Switch the drive output on or off.
    fn set_output_enabled(&mut self, channel: usize, enable: bool) -> DeviceResult<()>;

    /// Current drive output state.
    fn output_enabled(&mut self, channel: usize) -> DeviceResult<bool>;

    /// Start the reference (home) search. Returns without waiting.
    fn start_reference_search(&mut self, channel: usize) -> DeviceResult<()>;

    /// True once a reference position has been found.
    ///
    /// Default: never referenced (for transports without reference status).
    fn reference_valid(&mut self, _channel: usize) -> DeviceResult<bool> {
        Ok(false)
    }

    /// Read one identity string.
    fn identity(&mut self, field: IdentityField) -> DeviceResult<IdentityString>;
}
