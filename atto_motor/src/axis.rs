//! One positioner channel.
//!
//! An `Axis` is the host-facing handle; its cached state (`AxisState`) lives
//! inside the controller lock so the poll loop and host operations see the
//! same values.
//!
//! # Move
//!
//! A move commands the target under the lock, then waits with the lock
//! released. Every `move_check_interval` it re-takes the lock and asks the
//! device whether the target is in range. The wait ends with:
//! - `Ok` once the device reports in range (cached position becomes the target)
//! - `Cancelled` if the axis is stopped, re-targeted, or the controller shuts down
//! - `Timeout` after `move_timeout` (the move is disabled first)
//!
//! Velocity and acceleration are accepted but never sent to the device.

use crate::best_effort::{best_effort, best_effort_quiet};
use crate::controller::{ControllerShared, ControllerState, connected, disable_output};
use crate::motor_params::MotorParams;
use atto_common::consts::AXIS_COMPONENT;
use atto_common::device::DeviceHandle;
use atto_common::motor::{AxisStatusFlags, MotorAxis, MotorError, MotorResult};
use atto_common::params::{ParamRegistry, ParamScope};
use std::io::Write;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Cached per-channel state. Guarded by the controller lock.
#[derive(Debug, Clone)]
pub(crate) struct AxisState {
    pub(crate) channel: usize,
    pub(crate) position: f64,
    pub(crate) moving: bool,
    /// Last commanded move-enable state
    pub(crate) move_enabled: bool,
    pub(crate) homed: bool,
    pub(crate) power_on: bool,
    pub(crate) problem: bool,
    /// Bumped by every move and stop; a waiting move whose generation no
    /// longer matches has been superseded.
    pub(crate) move_generation: u64,
}

impl AxisState {
    /// Create the cache for `channel` and switch its drive output on.
    pub(crate) fn attach(channel: usize, device: &mut Option<Box<dyn DeviceHandle>>, port: &str) -> Self {
        let power_on = best_effort(
            connected(device).and_then(|d| d.set_output_enabled(channel, true)),
            port,
            channel,
            "set_output_enabled",
        )
        .is_some();
        debug!(component = AXIS_COMPONENT, port, channel, power_on, "axis attached");

        Self {
            channel,
            position: 0.0,
            moving: false,
            move_enabled: false,
            homed: false,
            power_on,
            problem: false,
            move_generation: 0,
        }
    }

    pub(crate) fn flags(&self) -> AxisStatusFlags {
        let mut flags = AxisStatusFlags::empty();
        flags.set(AxisStatusFlags::DONE, !self.moving);
        flags.set(AxisStatusFlags::MOVING, self.moving);
        flags.set(AxisStatusFlags::HOMED, self.homed);
        flags.set(AxisStatusFlags::POWER_ON, self.power_on);
        flags.set(AxisStatusFlags::PROBLEM, self.problem);
        flags
    }

    /// Refresh the cache from the device and publish it. Returns `moving`.
    ///
    /// Read failures leave the previous value in place and raise the
    /// problem flag; they are never surfaced.
    pub(crate) fn poll_locked(
        &mut self,
        device: &mut Option<Box<dyn DeviceHandle>>,
        params: &mut ParamRegistry,
        ids: &MotorParams,
        port: &str,
    ) -> bool {
        let ch = self.channel;
        match device.as_deref_mut() {
            Some(d) => {
                let position = best_effort_quiet(d.position(ch), port, ch, "position");
                let in_range = best_effort_quiet(d.target_in_range(ch), port, ch, "target_in_range");
                if let Some(homed) = best_effort_quiet(d.reference_valid(ch), port, ch, "reference_valid") {
                    self.homed = homed;
                }
                if let Some(on) = best_effort_quiet(d.output_enabled(ch), port, ch, "output_enabled") {
                    self.power_on = on;
                }

                self.problem = position.is_none() || in_range.is_none();
                if let Some(position) = position {
                    self.position = position;
                }
                if let Some(in_range) = in_range {
                    self.moving = self.move_enabled && !in_range;
                }
            }
            None => self.problem = true,
        }

        self.publish(params, ids, port);
        self.moving
    }

    /// Publish the cache and notify listeners for this axis.
    fn publish(&self, params: &mut ParamRegistry, ids: &MotorParams, port: &str) {
        if let Err(e) = ids.publish_axis(params, self.channel, self.position, self.flags()) {
            warn!(port, channel = self.channel, error = %e, "failed to publish axis status");
        }
        params.call_param_callbacks(ParamScope::Axis(self.channel));
    }

    /// Clear a pending move, then switch the drive output off if it is still on.
    ///
    /// A failed read is treated as "off".
    pub(crate) fn destroy_locked(&self, device: &mut Option<Box<dyn DeviceHandle>>, port: &str) {
        let ch = self.channel;
        // A move cancelled by teardown must not resume on the next connect.
        if self.move_enabled {
            best_effort(
                connected(device).and_then(|d| d.set_move_enabled(ch, false)),
                port,
                ch,
                "set_move_enabled",
            );
        }
        let enabled = best_effort(
            connected(device).and_then(|d| d.output_enabled(ch)),
            port,
            ch,
            "output_enabled",
        )
        .unwrap_or(false);
        if enabled {
            disable_output(device, ch, port);
        }
        debug!(component = AXIS_COMPONENT, port, channel = ch, was_enabled = enabled, "axis destroyed");
    }
}

/// Host-facing handle for one channel.
///
/// Holds a non-owning reference to its controller.
#[derive(Debug)]
pub struct Axis {
    channel: usize,
    port: String,
    controller: Weak<ControllerShared>,
}

impl Axis {
    pub(crate) fn new(channel: usize, port: &str, controller: Weak<ControllerShared>) -> Self {
        Self {
            channel,
            port: port.to_string(),
            controller,
        }
    }

    fn controller(&self) -> MotorResult<Arc<ControllerShared>> {
        let shared = self.controller.upgrade().ok_or(MotorError::ControllerGone)?;
        if shared.is_shutting_down() {
            return Err(MotorError::ControllerGone);
        }
        Ok(shared)
    }

    /// Command the move. Returns the absolute target and the move generation.
    fn start_move(&self, shared: &ControllerShared, position: f64, relative: bool) -> MotorResult<(f64, u64)> {
        let ch = self.channel;
        let mut state = shared.state.lock();
        let ControllerState { device, axes, .. } = &mut *state;
        let axis = axes.get_mut(ch).ok_or(MotorError::ControllerGone)?;
        let d = connected(device)?;

        // A relative move cannot proceed without the current position.
        let target = if relative {
            let current = d.position(ch)?;
            axis.position = current;
            current + position
        } else {
            if let Some(current) = best_effort(d.position(ch), &self.port, ch, "position") {
                axis.position = current;
            }
            position
        };

        d.set_target_position(ch, target)?;
        d.set_move_enabled(ch, true)?;
        axis.move_enabled = true;
        axis.moving = true;
        axis.move_generation = axis.move_generation.wrapping_add(1);
        debug!(port = %self.port, channel = ch, target, relative, "move started");

        Ok((target, axis.move_generation))
    }

    /// One in-range check. `Some` ends the wait.
    fn check_move(&self, shared: &ControllerShared, target: f64, generation: u64) -> Option<MotorResult<()>> {
        let ch = self.channel;
        let cancelled = Some(Err(MotorError::Cancelled { channel: ch }));
        if shared.is_shutting_down() {
            return cancelled;
        }

        let mut state = shared.state.lock();
        let ControllerState { device, axes, params } = &mut *state;
        let axis = match axes.get_mut(ch) {
            Some(axis) if axis.move_generation == generation => axis,
            _ => return cancelled,
        };

        let in_range = best_effort_quiet(
            connected(device).and_then(|d| d.target_in_range(ch)),
            &self.port,
            ch,
            "target_in_range",
        )
        .unwrap_or(false);
        if !in_range {
            return None;
        }

        best_effort(
            connected(device).and_then(|d| d.set_move_enabled(ch, false)),
            &self.port,
            ch,
            "set_move_enabled",
        );
        axis.move_enabled = false;
        axis.moving = false;
        axis.position = target;
        axis.publish(params, &shared.ids, &self.port);
        debug!(port = %self.port, channel = ch, target, "move complete");
        Some(Ok(()))
    }

    fn abandon_move(&self, shared: &ControllerShared, generation: u64) {
        let ch = self.channel;
        let mut state = shared.state.lock();
        let ControllerState { device, axes, .. } = &mut *state;
        if let Some(axis) = axes.get_mut(ch).filter(|a| a.move_generation == generation) {
            best_effort(
                connected(device).and_then(|d| d.set_move_enabled(ch, false)),
                &self.port,
                ch,
                "set_move_enabled",
            );
            axis.move_enabled = false;
            axis.moving = false;
        }
    }
}

impl MotorAxis for Axis {
    fn channel(&self) -> usize {
        self.channel
    }

    fn move_to(
        &self,
        position: f64,
        relative: bool,
        min_velocity: f64,
        max_velocity: f64,
        acceleration: f64,
    ) -> MotorResult<()> {
        let shared = self.controller()?;
        trace!(
            port = %self.port,
            channel = self.channel,
            min_velocity,
            max_velocity,
            acceleration,
            "velocity and acceleration are not sent to the device"
        );

        let (target, generation) = self.start_move(&shared, position, relative)?;
        let timing = shared.timing;
        let started = Instant::now();
        loop {
            if let Some(result) = self.check_move(&shared, target, generation) {
                return result;
            }
            let waited = started.elapsed();
            if waited >= timing.move_timeout {
                self.abandon_move(&shared, generation);
                warn!(port = %self.port, channel = self.channel, target, ?waited, "move timed out");
                return Err(MotorError::Timeout {
                    channel: self.channel,
                    waited,
                });
            }
            thread::sleep(timing.move_check_interval);
        }
    }

    fn stop(&self, acceleration: f64) -> MotorResult<()> {
        trace!(port = %self.port, channel = self.channel, acceleration, "stop requested");
        let Some(shared) = self.controller.upgrade() else {
            return Ok(());
        };

        let ch = self.channel;
        let mut state = shared.state.lock();
        let ControllerState { device, axes, .. } = &mut *state;
        best_effort(
            connected(device).and_then(|d| d.set_move_enabled(ch, false)),
            &self.port,
            ch,
            "set_move_enabled",
        );
        if let Some(axis) = axes.get_mut(ch) {
            axis.move_enabled = false;
            axis.moving = false;
            axis.move_generation = axis.move_generation.wrapping_add(1);
        }
        Ok(())
    }

    fn home(&self, min_velocity: f64, max_velocity: f64, acceleration: f64, forwards: bool) -> MotorResult<()> {
        let shared = self.controller()?;
        trace!(
            port = %self.port,
            channel = self.channel,
            min_velocity,
            max_velocity,
            acceleration,
            forwards,
            "reference search ignores velocity, acceleration and direction"
        );

        let ch = self.channel;
        let mut state = shared.state.lock();
        best_effort(
            connected(&mut state.device).and_then(|d| d.start_reference_search(ch)),
            &self.port,
            ch,
            "start_reference_search",
        );
        Ok(())
    }

    fn poll(&self) -> MotorResult<bool> {
        let shared = self.controller()?;
        let mut state = shared.state.lock();
        let ControllerState { device, axes, params } = &mut *state;
        let axis = axes.get_mut(self.channel).ok_or(MotorError::ControllerGone)?;
        Ok(axis.poll_locked(device, params, &shared.ids, &self.port))
    }

    fn report(&self, out: &mut dyn Write, level: u32) {
        let Some(shared) = self.controller.upgrade() else {
            let _ = writeln!(out, "axis {} (port {}): controller gone", self.channel, self.port);
            return;
        };
        let state = shared.state.lock();
        let Some(axis) = state.axes.get(self.channel) else {
            let _ = writeln!(out, "axis {} (port {}): torn down", self.channel, self.port);
            return;
        };

        let _ = writeln!(
            out,
            "axis {} (port {}): position={} status=0x{:04x}",
            self.channel,
            self.port,
            axis.position,
            axis.flags().bits()
        );
        if level >= 1 {
            let _ = writeln!(
                out,
                "    moving={} move_enabled={} homed={} power_on={} problem={}",
                axis.moving, axis.move_enabled, axis.homed, axis.power_on, axis.problem
            );
        }
    }
}
