//! Shared test fixtures: a scriptable device that records every call.

#![allow(dead_code)]

use atto_common::consts::MAX_AXES;
use atto_common::device::{
    DeviceConnector, DeviceError, DeviceHandle, DeviceResult, IdentityField, IdentityString,
    identity_string,
};
use atto_motor::ControllerTiming;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Disconnect,
    Position(usize),
    SetTarget(usize, f64),
    SetMoveEnabled(usize, bool),
    TargetInRange(usize),
    SetOutputEnabled(usize, bool),
    OutputEnabled(usize),
    StartReferenceSearch(usize),
    ReferenceValid(usize),
    Identity(IdentityField),
}

/// Scripted device behaviour plus the call log.
#[derive(Debug)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub positions: [f64; MAX_AXES],
    pub in_range: bool,
    pub referenced: bool,
    pub outputs: [bool; MAX_AXES],
    /// Operation names that return a command error
    pub failing: HashSet<&'static str>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            positions: [0.0; MAX_AXES],
            in_range: true,
            referenced: false,
            outputs: [false; MAX_AXES],
            failing: HashSet::new(),
        }
    }
}

/// Cloneable handle to a shared `MockState`.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn set_position(&self, channel: usize, position: f64) {
        self.state.lock().positions[channel] = position;
    }

    pub fn set_in_range(&self, in_range: bool) {
        self.state.lock().in_range = in_range;
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().failing.insert(op);
    }

    fn record(&self, call: Call, op: &'static str, channel: usize) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(DeviceError::Command { op, channel, code: 2 });
        }
        Ok(())
    }
}

impl DeviceHandle for MockDevice {
    fn disconnect(&mut self) -> DeviceResult<()> {
        self.record(Call::Disconnect, "disconnect", 0)
    }

    fn position(&mut self, channel: usize) -> DeviceResult<f64> {
        self.record(Call::Position(channel), "position", channel)?;
        Ok(self.state.lock().positions[channel])
    }

    fn set_target_position(&mut self, channel: usize, target: f64) -> DeviceResult<()> {
        self.record(Call::SetTarget(channel, target), "set_target_position", channel)
    }

    fn set_move_enabled(&mut self, channel: usize, enable: bool) -> DeviceResult<()> {
        self.record(Call::SetMoveEnabled(channel, enable), "set_move_enabled", channel)
    }

    fn target_in_range(&mut self, channel: usize) -> DeviceResult<bool> {
        self.record(Call::TargetInRange(channel), "target_in_range", channel)?;
        Ok(self.state.lock().in_range)
    }

    fn set_output_enabled(&mut self, channel: usize, enable: bool) -> DeviceResult<()> {
        self.record(Call::SetOutputEnabled(channel, enable), "set_output_enabled", channel)?;
        self.state.lock().outputs[channel] = enable;
        Ok(())
    }

    fn output_enabled(&mut self, channel: usize) -> DeviceResult<bool> {
        self.record(Call::OutputEnabled(channel), "output_enabled", channel)?;
        Ok(self.state.lock().outputs[channel])
    }

    fn start_reference_search(&mut self, channel: usize) -> DeviceResult<()> {
        self.record(Call::StartReferenceSearch(channel), "start_reference_search", channel)
    }

    fn reference_valid(&mut self, channel: usize) -> DeviceResult<bool> {
        self.record(Call::ReferenceValid(channel), "reference_valid", channel)?;
        Ok(self.state.lock().referenced)
    }

    fn identity(&mut self, field: IdentityField) -> DeviceResult<IdentityString> {
        self.record(Call::Identity(field), "identity", 0)?;
        let value = match field {
            IdentityField::SerialNumber => "L01-0042",
            IdentityField::DeviceName => "bench-amc",
            IdentityField::FirmwareVersion => "1.3.2",
            IdentityField::Hostname => "amc100",
            IdentityField::IpAddress => "192.168.1.50",
            IdentityField::MacAddress => "00:50:C2:00:00:01",
        };
        Ok(identity_string(value))
    }
}

/// Connector handing out clones of one `MockDevice`.
pub struct MockConnector {
    pub device: MockDevice,
    pub refuse: bool,
}

impl MockConnector {
    pub fn new(device: &MockDevice) -> Self {
        Self {
            device: device.clone(),
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            device: MockDevice::new(),
            refuse: true,
        }
    }
}

impl DeviceConnector for MockConnector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn connect(&self, address: &str) -> DeviceResult<Box<dyn DeviceHandle>> {
        if self.refuse {
            return Err(DeviceError::ConnectionFailed {
                address: address.to_string(),
                code: -7,
            });
        }
        Ok(Box::new(self.device.clone()))
    }
}

/// Timing where the poll loop effectively never fires on its own.
pub fn manual_timing() -> ControllerTiming {
    ControllerTiming {
        poll_interval: Duration::from_secs(3600),
        move_check_interval: Duration::from_millis(1),
        move_timeout: Duration::from_millis(200),
    }
}

/// Timing with a fast background poll.
pub fn fast_timing() -> ControllerTiming {
    ControllerTiming {
        poll_interval: Duration::from_millis(2),
        move_check_interval: Duration::from_millis(1),
        move_timeout: Duration::from_millis(200),
    }
}

/// Index of the first call matching `pred`.
pub fn first_index(calls: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    calls.iter().position(pred)
}

/// Index of the last call matching `pred`.
pub fn last_index(calls: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    calls.iter().rposition(pred)
}
