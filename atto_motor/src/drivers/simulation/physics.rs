//! Per-channel piezo positioner physics.
//!
//! Constant-speed slew toward the target while the drive output and the
//! move are both enabled. A reference search drives to the reference
//! position and then marks the channel referenced.

use std::time::Duration;
use tracing::{debug, trace};

/// Reference search state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceState {
    /// No valid reference
    Unreferenced,
    /// Driving toward the reference mark
    Searching,
    /// Reference found, position is valid
    Referenced,
}

/// Motion parameters shared by every channel of one device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelParams {
    /// Slew speed in device units per second
    pub speed: f64,
    /// Half-width of the in-range window
    pub in_range_window: f64,
    /// Where the reference mark sits
    pub reference_position: f64,
}

/// One simulated positioner channel.
#[derive(Debug, Clone)]
pub struct ChannelSimulator {
    position: f64,
    target: f64,
    move_enabled: bool,
    output_enabled: bool,
    reference: ReferenceState,
    params: ChannelParams,
}

impl ChannelSimulator {
    /// Channel at rest at position 0, output off.
    pub fn new(params: ChannelParams) -> Self {
        Self {
            position: 0.0,
            target: 0.0,
            move_enabled: false,
            output_enabled: false,
            reference: ReferenceState::Unreferenced,
            params,
        }
    }

    /// Current position.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Commanded target.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Set the target position.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Whether approach to the target is enabled.
    pub fn move_enabled(&self) -> bool {
        self.move_enabled
    }

    /// Enable or disable approach to the target.
    pub fn set_move_enabled(&mut self, enable: bool) {
        self.move_enabled = enable;
    }

    /// Drive output state.
    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    /// Switching the output off aborts a running reference search.
    pub fn set_output_enabled(&mut self, enable: bool) {
        self.output_enabled = enable;
        if !enable && self.reference == ReferenceState::Searching {
            self.reference = ReferenceState::Unreferenced;
        }
    }

    /// True when the position is within the window around the target.
    pub fn target_in_range(&self) -> bool {
        (self.position - self.target).abs() <= self.params.in_range_window
    }

    /// Reference search state.
    pub fn reference_state(&self) -> ReferenceState {
        self.reference
    }

    /// Begin a reference search. Ignored while the output is off.
    pub fn start_reference_search(&mut self) {
        if !self.output_enabled {
            debug!("Reference search ignored: output disabled");
            return;
        }
        self.reference = ReferenceState::Searching;
        debug!("Reference search started toward {:.3}", self.params.reference_position);
    }

    /// Advance the simulation by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        if !self.output_enabled {
            return;
        }
        let step = self.params.speed * dt.as_secs_f64();

        if self.reference == ReferenceState::Searching {
            self.position = slew(self.position, self.params.reference_position, step);
            if (self.position - self.params.reference_position).abs() <= self.params.in_range_window {
                self.reference = ReferenceState::Referenced;
                trace!("Reference found at {:.3}", self.position);
            }
        } else if self.move_enabled {
            self.position = slew(self.position, self.target, step);
        }
    }
}

fn slew(from: f64, to: f64, step: f64) -> f64 {
    let diff = to - from;
    if diff.abs() <= step { to } else { from + step.copysign(diff) }
}
