//! Registry of device drivers.
//!
//! Maps a driver name (the `driver` field of a controller config) to a
//! factory producing a `DeviceConnector`. Built at startup and handed to the
//! `PortRegistry` by value.

use crate::drivers::simulation;
use atto_common::device::DeviceConnector;
use atto_common::motor::{MotorError, MotorResult};
use std::collections::HashMap;

/// Factory producing a connector for one driver.
pub type ConnectorFactory = fn() -> Box<dyn DeviceConnector>;

/// Registry of available device drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, ConnectorFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in driver (`"simulation"`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(simulation::DRIVER_NAME, simulation::create_connector);
        registry
    }

    /// Register a connector factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: ConnectorFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a connector factory by name.
    pub fn get_factory(&self, name: &str) -> Option<ConnectorFactory> {
        self.factories.get(name).copied()
    }

    /// Create a connector by driver name.
    ///
    /// # Errors
    /// Returns `MotorError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_connector(&self, name: &str) -> MotorResult<Box<dyn DeviceConnector>> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| MotorError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
