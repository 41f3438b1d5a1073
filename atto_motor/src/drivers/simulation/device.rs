//! Simulated controller connection.
//!
//! `SimulationConnector` opens `SimulatedDevice` handles. Each handle runs
//! the channel physics forward by wall-clock time on every call, so a move
//! commanded through it completes after `distance / speed` seconds.

use super::physics::{ChannelParams, ChannelSimulator, ReferenceState};
use atto_common::consts::MAX_AXES;
use atto_common::device::{
    DeviceConnector, DeviceError, DeviceHandle, DeviceResult, IdentityField, IdentityString,
    identity_string,
};
use std::time::Instant;
use tracing::{debug, info};

/// Simulation driver settings.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of channels the simulated controller has
    pub channels: usize,
    /// Slew speed in device units per second
    pub speed: f64,
    /// Half-width of the in-range window
    pub in_range_window: f64,
    /// Position of the reference mark
    pub reference_position: f64,
    /// Refuse every connection attempt
    pub refuse_connect: bool,
    /// Reported serial number
    pub serial_number: String,
    /// Reported device name
    pub device_name: String,
    /// Reported firmware version
    pub firmware_version: String,
    /// Reported hostname
    pub hostname: String,
    /// Reported MAC address
    pub mac_address: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            channels: MAX_AXES,
            speed: 1000.0,
            in_range_window: 0.01,
            reference_position: 0.0,
            refuse_connect: false,
            serial_number: "SIM-AMC-0001".to_string(),
            device_name: "simulated-amc".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: "atto-sim".to_string(),
            mac_address: "02:00:00:00:00:01".to_string(),
        }
    }
}

impl SimulationConfig {
    fn channel_params(&self) -> ChannelParams {
        ChannelParams {
            speed: self.speed,
            in_range_window: self.in_range_window,
            reference_position: self.reference_position,
        }
    }
}

/// Connector for simulated controllers.
#[derive(Debug, Clone, Default)]
pub struct SimulationConnector {
    config: SimulationConfig,
}

impl SimulationConnector {
    /// Connector producing devices with `config`.
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

impl DeviceConnector for SimulationConnector {
    fn name(&self) -> &'static str {
        super::DRIVER_NAME
    }

    fn connect(&self, address: &str) -> DeviceResult<Box<dyn DeviceHandle>> {
        if self.config.refuse_connect || address.is_empty() {
            return Err(DeviceError::ConnectionFailed {
                address: address.to_string(),
                code: -1,
            });
        }
        info!("Simulated controller connected at {}", address);
        Ok(Box::new(SimulatedDevice::new(self.config.clone(), address)))
    }
}

/// Open connection to a simulated controller.
#[derive(Debug)]
pub struct SimulatedDevice {
    config: SimulationConfig,
    address: String,
    channels: Vec<ChannelSimulator>,
    last_update: Instant,
    connected: bool,
}

impl SimulatedDevice {
    /// Device with every channel at rest, output off.
    pub fn new(config: SimulationConfig, address: &str) -> Self {
        let params = config.channel_params();
        Self {
            channels: vec![ChannelSimulator::new(params); config.channels],
            config,
            address: address.to_string(),
            last_update: Instant::now(),
            connected: true,
        }
    }

    /// Run physics up to now, then borrow one channel.
    fn channel(&mut self, channel: usize) -> DeviceResult<&mut ChannelSimulator> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let now = Instant::now();
        let dt = now.duration_since(self.last_update);
        self.last_update = now;
        for ch in &mut self.channels {
            ch.advance(dt);
        }
        self.channels
            .get_mut(channel)
            .ok_or(DeviceError::InvalidChannel(channel))
    }
}

impl DeviceHandle for SimulatedDevice {
    fn disconnect(&mut self) -> DeviceResult<()> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        self.connected = false;
        debug!("Simulated controller at {} disconnected", self.address);
        Ok(())
    }

    fn position(&mut self, channel: usize) -> DeviceResult<f64> {
        Ok(self.channel(channel)?.position())
    }

    fn set_target_position(&mut self, channel: usize, target: f64) -> DeviceResult<()> {
        self.channel(channel)?.set_target(target);
        Ok(())
    }

    fn set_move_enabled(&mut self, channel: usize, enable: bool) -> DeviceResult<()> {
        self.channel(channel)?.set_move_enabled(enable);
        Ok(())
    }

    fn target_in_range(&mut self, channel: usize) -> DeviceResult<bool> {
        Ok(self.channel(channel)?.target_in_range())
    }

    fn set_output_enabled(&mut self, channel: usize, enable: bool) -> DeviceResult<()> {
        self.channel(channel)?.set_output_enabled(enable);
        Ok(())
    }

    fn output_enabled(&mut self, channel: usize) -> DeviceResult<bool> {
        Ok(self.channel(channel)?.output_enabled())
    }

    fn start_reference_search(&mut self, channel: usize) -> DeviceResult<()> {
        self.channel(channel)?.start_reference_search();
        Ok(())
    }

    fn reference_valid(&mut self, channel: usize) -> DeviceResult<bool> {
        Ok(self.channel(channel)?.reference_state() == ReferenceState::Referenced)
    }

    fn identity(&mut self, field: IdentityField) -> DeviceResult<IdentityString> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let value = match field {
            IdentityField::SerialNumber => self.config.serial_number.as_str(),
            IdentityField::DeviceName => self.config.device_name.as_str(),
            IdentityField::FirmwareVersion => self.config.firmware_version.as_str(),
            IdentityField::Hostname => self.config.hostname.as_str(),
            IdentityField::IpAddress => self.address.as_str(),
            IdentityField::MacAddress => self.config.mac_address.as_str(),
        };
        Ok(identity_string(value))
    }
}
