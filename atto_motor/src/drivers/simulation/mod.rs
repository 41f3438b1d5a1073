//! Simulation driver module.
//!
//! Software stand-in for a networked positioner controller, used for
//! development and tests without hardware.

mod device;
mod physics;

pub use device::{SimulatedDevice, SimulationConfig, SimulationConnector};
pub use physics::{ChannelParams, ChannelSimulator, ReferenceState};

use atto_common::device::DeviceConnector;

/// Registry name of the simulation driver.
pub const DRIVER_NAME: &str = "simulation";

/// Factory function to create a simulation connector with default settings.
pub fn create_connector() -> Box<dyn DeviceConnector> {
    Box::new(SimulationConnector::default())
}
