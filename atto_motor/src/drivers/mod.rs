//! Device driver implementations.
//!
//! - [`simulation`] - Physics-backed simulated controller for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `DeviceConnector` and `DeviceHandle` from `atto_common::device`
//! 3. Register the factory in `DriverRegistry::with_builtin()`

pub mod simulation;
