//! Controller: owns the device connection, the axes and the poll loop.
//!
//! All hardware access and every cached axis value sit behind one
//! `parking_lot::Mutex<ControllerState>`. The poll loop takes it once per
//! cycle; host operations take it for the duration of each device exchange.
//! A move releases it between in-range checks (see [`crate::axis`]).
//!
//! Teardown order is fixed: stop and join the poll loop, destroy axes in
//! ascending channel order, then disconnect.

use crate::axis::{Axis, AxisState};
use crate::best_effort::best_effort;
use crate::motor_params::MotorParams;
use crate::poll::PollLoop;
use atto_common::config::ConfigError;
use atto_common::consts::{
    CONTROLLER_COMPONENT, DEFAULT_MOVE_CHECK_INTERVAL_MS, DEFAULT_MOVE_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, MAX_AXES,
};
use atto_common::device::{DeviceConnector, DeviceError, DeviceHandle, DeviceResult, IdentitySnapshot};
use atto_common::motor::{AxisLocator, MotorAxis, MotorController, MotorError, MotorResult};
use atto_common::params::{ParamId, ParamListener, ParamRegistry, ParamScope};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timing knobs for one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTiming {
    /// Sleep between poll cycles
    pub poll_interval: Duration,
    /// Sleep between in-range checks during a move
    pub move_check_interval: Duration,
    /// Upper bound on a single move
    pub move_timeout: Duration,
}

impl ControllerTiming {
    /// Reject zero durations.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` naming the first zero field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("poll_interval", self.poll_interval),
            ("move_check_interval", self.move_check_interval),
            ("move_timeout", self.move_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ControllerTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            move_check_interval: Duration::from_millis(DEFAULT_MOVE_CHECK_INTERVAL_MS),
            move_timeout: Duration::from_millis(DEFAULT_MOVE_TIMEOUT_MS),
        }
    }
}

/// Everything guarded by the controller lock.
pub(crate) struct ControllerState {
    /// `None` when connect failed or after disconnect
    pub(crate) device: Option<Box<dyn DeviceHandle>>,
    /// Indexed by channel. Emptied at teardown.
    pub(crate) axes: Vec<AxisState>,
    pub(crate) params: ParamRegistry,
}

/// Borrow the open device, or `NotConnected`.
pub(crate) fn connected(
    device: &mut Option<Box<dyn DeviceHandle>>,
) -> DeviceResult<&mut (dyn DeviceHandle + 'static)> {
    device.as_deref_mut().ok_or(DeviceError::NotConnected)
}

/// State shared between the controller, its axes and the poll thread.
pub(crate) struct ControllerShared {
    pub(crate) port: String,
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) ids: MotorParams,
    pub(crate) timing: ControllerTiming,
    pub(crate) shutting_down: AtomicBool,
    pub(crate) poll_cycles: AtomicU64,
}

impl ControllerShared {
    /// One poll cycle. Caller holds the lock.
    pub(crate) fn poll_cycle(&self, state: &mut ControllerState) {
        let ControllerState { device, axes, params } = state;

        publish_connected(params, device.is_some(), &self.ids, &self.port);

        for axis in axes.iter_mut() {
            axis.poll_locked(device, params, &self.ids, &self.port);
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

/// Serializable view of a controller for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    /// Port name
    pub port: String,
    /// Device address
    pub address: String,
    /// Whether a device connection is open
    pub connected: bool,
    /// Identity strings, if connect succeeded
    pub identity: Option<IdentitySnapshot>,
    /// Completed poll cycles
    pub poll_cycles: u64,
    /// Per-axis cache
    pub axes: Vec<AxisSnapshot>,
}

/// Serializable view of one axis cache.
#[derive(Debug, Clone, Serialize)]
pub struct AxisSnapshot {
    /// Channel number
    pub channel: usize,
    /// Last known position
    pub position: f64,
    /// `AxisStatusFlags` bits
    pub status: u16,
}

/// One configured motion controller.
///
/// Construction never fails because the device is unreachable: the controller
/// comes up disconnected, logs the error and reports `is_connected() == false`.
pub struct Controller {
    shared: Arc<ControllerShared>,
    axes: Vec<Axis>,
    address: String,
    identity: Option<IdentitySnapshot>,
    poller: Mutex<Option<PollLoop>>,
}

impl Controller {
    /// Connect to `address` and bring up `axis_count` axes and the poll loop.
    ///
    /// # Errors
    /// Returns `MotorError::Config` for an axis count outside `1..=MAX_AXES`
    /// or a zero timing field, and `MotorError::PollThread` if the poll thread cannot be spawned.
    /// A failed connect is not an error.
    pub fn new(
        port: &str,
        address: &str,
        axis_count: usize,
        connector: &dyn DeviceConnector,
        timing: ControllerTiming,
    ) -> MotorResult<Self> {
        if axis_count == 0 || axis_count > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "axis_count must be 1..={MAX_AXES}, got {axis_count}"
            ))
            .into());
        }
        timing.validate()?;

        let mut params = ParamRegistry::new();
        let ids = MotorParams::create(&mut params)?;

        let (device, identity) = match connector.connect(address) {
            Ok(mut handle) => {
                let snapshot = IdentitySnapshot::capture(&mut *handle);
                ids.publish_identity(&mut params, &snapshot)?;
                info!(
                    component = CONTROLLER_COMPONENT,
                    port,
                    "Connected to device: {}",
                    snapshot.serial_number
                );
                (Some(handle), Some(snapshot))
            }
            Err(e) => {
                error!(
                    component = CONTROLLER_COMPONENT,
                    port,
                    address,
                    error = %e,
                    "Failed to connect to device"
                );
                (None, None)
            }
        };

        let mut state = ControllerState {
            device,
            axes: Vec::with_capacity(axis_count),
            params,
        };
        publish_connected(&mut state.params, state.device.is_some(), &ids, port);
        for channel in 0..axis_count {
            let axis = AxisState::attach(channel, &mut state.device, port);
            state.axes.push(axis);
        }

        let shared = Arc::new(ControllerShared {
            port: port.to_string(),
            state: Mutex::new(state),
            ids,
            timing,
            shutting_down: AtomicBool::new(false),
            poll_cycles: AtomicU64::new(0),
        });

        let axes = (0..axis_count)
            .map(|channel| Axis::new(channel, port, Arc::downgrade(&shared)))
            .collect();

        // On spawn failure the partially built controller drops and tears down.
        let controller = Self {
            shared,
            axes,
            address: address.to_string(),
            identity,
            poller: Mutex::new(None),
        };
        let poller = PollLoop::start(Arc::clone(&controller.shared))?;
        *controller.poller.lock() = Some(poller);
        debug!(
            port,
            axis_count,
            interval_ms = timing.poll_interval.as_millis() as u64,
            "poll loop started"
        );

        Ok(controller)
    }

    /// Port name this controller was configured under.
    pub fn port(&self) -> &str {
        &self.shared.port
    }

    /// Network address passed at construction.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of configured axes.
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Identity captured after connect. `None` if connect failed.
    pub fn identity(&self) -> Option<&IdentitySnapshot> {
        self.identity.as_ref()
    }

    /// Whether a device connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().device.is_some()
    }

    /// Timing this controller runs with.
    pub fn timing(&self) -> ControllerTiming {
        self.shared.timing
    }

    /// Number of completed background poll cycles.
    pub fn poll_cycles(&self) -> u64 {
        self.shared.poll_cycles.load(Ordering::Relaxed)
    }

    /// Parameter ids of every published slot.
    pub fn params(&self) -> &MotorParams {
        &self.shared.ids
    }

    /// Look up a parameter id by name.
    pub fn param_id(&self, name: &str) -> Option<ParamId> {
        self.shared.state.lock().params.find(name)
    }

    /// Run `f` against the parameter registry under the controller lock.
    pub fn with_params<R>(&self, f: impl FnOnce(&ParamRegistry) -> R) -> R {
        f(&self.shared.state.lock().params)
    }

    /// Register a parameter change listener.
    ///
    /// Listeners run with the controller lock held and must not call back
    /// into this controller.
    pub fn add_param_listener(&self, listener: ParamListener) {
        self.shared.state.lock().params.add_listener(listener);
    }

    /// Run one poll cycle on the calling thread.
    pub fn poll_now(&self) {
        let mut state = self.shared.state.lock();
        self.shared.poll_cycle(&mut state);
    }

    /// Serializable view of the controller.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.shared.state.lock();
        ControllerSnapshot {
            port: self.shared.port.clone(),
            address: self.address.clone(),
            connected: state.device.is_some(),
            identity: self.identity.clone(),
            poll_cycles: self.poll_cycles(),
            axes: state
                .axes
                .iter()
                .map(|a| AxisSnapshot {
                    channel: a.channel,
                    position: a.position,
                    status: a.flags().bits(),
                })
                .collect(),
        }
    }

    /// Tear the controller down. Idempotent; also runs on drop.
    ///
    /// Stops and joins the poll loop, destroys the axes in ascending channel
    /// order, then disconnects. A move waiting on an axis ends with
    /// `MotorError::Cancelled`.
    pub fn shutdown(&self) {
        if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let port = self.shared.port.as_str();
        debug!(port, "shutting down controller");

        let poller = self.poller.lock().take();
        if let Some(mut poller) = poller {
            poller.stop();
        }

        let mut state = self.shared.state.lock();
        let ControllerState { device, axes, .. } = &mut *state;
        for axis in axes.iter() {
            axis.destroy_locked(device, port);
        }
        axes.clear();

        if let Some(mut handle) = device.take() {
            match handle.disconnect() {
                Ok(()) => info!(component = CONTROLLER_COMPONENT, port, "Goodbye."),
                Err(e) => error!(
                    component = CONTROLLER_COMPONENT,
                    port,
                    error = %e,
                    "Failed to disconnect from device"
                ),
            }
        }
    }

    fn render_report(&self, level: u32) -> String {
        let mut text = String::new();
        let snapshot = self.snapshot();
        let _ = writeln!(text, "Attocube controller {}", snapshot.port);
        let _ = writeln!(text, "  address: {}", snapshot.address);
        let _ = writeln!(text, "  connected: {}", snapshot.connected);
        match &snapshot.identity {
            Some(id) => {
                let _ = writeln!(text, "  serial: {}", id.serial_number);
                let _ = writeln!(text, "  device name: {}", id.device_name);
                let _ = writeln!(text, "  firmware: {}", id.firmware_version);
                let _ = writeln!(text, "  hostname: {}", id.hostname);
                let _ = writeln!(text, "  ip: {}", id.ip_address);
                let _ = writeln!(text, "  mac: {}", id.mac_address);
            }
            None => {
                let _ = writeln!(text, "  identity: unavailable");
            }
        }
        let _ = writeln!(
            text,
            "  poll interval: {} ms, cycles: {}",
            self.shared.timing.poll_interval.as_millis(),
            snapshot.poll_cycles
        );
        let _ = writeln!(text, "  axes: {}", self.axes.len());

        if level >= 1 {
            for axis in &snapshot.axes {
                let _ = writeln!(
                    text,
                    "    axis {}: position={} status=0x{:04x}",
                    axis.channel, axis.position, axis.status
                );
            }
        }
        if level >= 2 {
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => {
                    let _ = writeln!(text, "{json}");
                }
                Err(e) => warn!(port = %snapshot.port, error = %e, "failed to serialize report"),
            }
        }
        text
    }
}

/// Refresh the controller-level connection flag and notify listeners.
fn publish_connected(params: &mut ParamRegistry, connected: bool, ids: &MotorParams, port: &str) {
    if let Err(e) = params.set_integer(ParamScope::Controller, ids.connected, i32::from(connected)) {
        warn!(port, error = %e, "failed to publish connection state");
    }
    params.call_param_callbacks(ParamScope::Controller);
}

impl MotorController for Controller {
    fn write_integer(&self, locator: AxisLocator, param: ParamId, value: i32) -> MotorResult<()> {
        let channel = locator
            .channel()
            .filter(|&c| c < self.axes.len())
            .ok_or(MotorError::InvalidAxis(locator.addr()))?;

        let port = self.shared.port.as_str();
        let ids = &self.shared.ids;
        let mut state = self.shared.state.lock();
        let ControllerState { device, axes, params } = &mut *state;
        let axis = axes
            .get_mut(channel)
            .ok_or(MotorError::InvalidAxis(locator.addr()))?;

        let scope = ParamScope::Axis(channel);
        params.set_integer(scope, param, value)?;

        let result = if param == ids.closed_loop {
            let enable = value != 0;
            connected(device)
                .and_then(|d| d.set_output_enabled(channel, enable))
                .map(|()| axis.power_on = enable)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            error!(port, channel, %param, value, error = %e, "parameter write failed");
        }

        params.call_param_callbacks(scope);
        Ok(())
    }

    fn axis(&self, index: usize) -> Option<&dyn MotorAxis> {
        if self.shared.is_shutting_down() {
            return None;
        }
        self.axes.get(index).map(|a| a as &dyn MotorAxis)
    }

    fn report(&self, out: &mut dyn Write, level: u32) {
        let text = self.render_report(level);
        if let Err(e) = out.write_all(text.as_bytes()) {
            debug!(port = %self.shared.port, error = %e, "report sink rejected output");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("port", &self.shared.port)
            .field("address", &self.address)
            .field("axes", &self.axes.len())
            .finish()
    }
}

/// Helper for disabling a best-effort drive output; shared with axis teardown.
pub(crate) fn disable_output(device: &mut Option<Box<dyn DeviceHandle>>, channel: usize, port: &str) {
    best_effort(
        connected(device).and_then(|d| d.set_output_enabled(channel, false)),
        port,
        channel,
        "set_output_enabled",
    );
}
