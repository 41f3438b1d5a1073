//! Administrative entry point: configure controllers by port name.
//!
//! The registry owns every controller it configures and tears them down in
//! reverse configuration order on `shutdown_all` or drop.

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::driver_registry::DriverRegistry;
use atto_common::motor::{MotorError, MotorResult};
use tracing::info;

/// Owner of all configured controllers.
pub struct PortRegistry {
    drivers: DriverRegistry,
    controllers: Vec<Controller>,
}

impl PortRegistry {
    /// Empty registry resolving drivers through `drivers`.
    pub fn new(drivers: DriverRegistry) -> Self {
        Self {
            drivers,
            controllers: Vec::new(),
        }
    }

    /// Configure a controller with the default driver and timings.
    ///
    /// Returns a status only; the controller is reachable afterwards through
    /// [`PortRegistry::controller`].
    pub fn configure(&mut self, port: &str, address: &str, axis_count: usize) -> MotorResult<()> {
        self.configure_with(&ControllerConfig::new(port, address, axis_count))
    }

    /// Configure a controller from a full config entry.
    ///
    /// # Errors
    /// `DuplicatePort` if the port name is taken, `Config` if the entry is
    /// invalid, `DriverNotFound` for an unknown driver. An unreachable
    /// device is not an error.
    pub fn configure_with(&mut self, config: &ControllerConfig) -> MotorResult<()> {
        if self.controller(&config.port_name).is_some() {
            return Err(MotorError::DuplicatePort(config.port_name.clone()));
        }
        config.validate()?;

        let connector = self.drivers.create_connector(&config.driver)?;
        let controller = Controller::new(
            &config.port_name,
            &config.address,
            config.axis_count,
            connector.as_ref(),
            config.timing(),
        )?;
        info!(
            "Configured {} ({} axes, driver={}, connected={})",
            config.port_name,
            config.axis_count,
            connector.name(),
            controller.is_connected()
        );
        self.controllers.push(controller);
        Ok(())
    }

    /// Controller configured under `port`.
    pub fn controller(&self, port: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.port() == port)
    }

    /// All controllers in configuration order.
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// Number of configured controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// True if nothing has been configured.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Tear down and release every controller, newest first.
    pub fn shutdown_all(&mut self) {
        while let Some(controller) = self.controllers.pop() {
            controller.shutdown();
        }
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new(DriverRegistry::with_builtin())
    }
}

impl Drop for PortRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
