//! Parameter slots published by a controller and its axes.

use atto_common::device::{IdentityField, IdentitySnapshot};
use atto_common::motor::AxisStatusFlags;
use atto_common::params::{ParamError, ParamId, ParamRegistry, ParamScope, ParamType};

/// Axis position in device units (double).
pub const MOTOR_POSITION: &str = "MOTOR_POSITION";
/// Motion-done flag (integer 0/1).
pub const MOTOR_STATUS_DONE: &str = "MOTOR_STATUS_DONE";
/// Moving flag (integer 0/1).
pub const MOTOR_STATUS_MOVING: &str = "MOTOR_STATUS_MOVING";
/// Reference-valid flag (integer 0/1).
pub const MOTOR_STATUS_HOMED: &str = "MOTOR_STATUS_HOMED";
/// Hardware read failure flag (integer 0/1).
pub const MOTOR_STATUS_PROBLEM: &str = "MOTOR_STATUS_PROBLEM";
/// All status bits as `AxisStatusFlags` (integer).
pub const MOTOR_STATUS: &str = "MOTOR_STATUS";
/// Writable drive output switch (integer 0/1).
pub const MOTOR_CLOSED_LOOP: &str = "MOTOR_CLOSED_LOOP";
/// Controller connection flag (integer 0/1).
pub const ATTOCUBE_CONNECTED: &str = "ATTOCUBE_CONNECTED";

/// Ids of every slot a controller creates, resolved once at construction.
#[derive(Debug, Clone)]
pub struct MotorParams {
    /// `MOTOR_POSITION`
    pub position: ParamId,
    /// `MOTOR_STATUS_DONE`
    pub done: ParamId,
    /// `MOTOR_STATUS_MOVING`
    pub moving: ParamId,
    /// `MOTOR_STATUS_HOMED`
    pub homed: ParamId,
    /// `MOTOR_STATUS_PROBLEM`
    pub problem: ParamId,
    /// `MOTOR_STATUS`
    pub status: ParamId,
    /// `MOTOR_CLOSED_LOOP`
    pub closed_loop: ParamId,
    /// `ATTOCUBE_CONNECTED`
    pub connected: ParamId,
    /// One string slot per identity field
    pub identity: [(IdentityField, ParamId); 6],
}

impl MotorParams {
    /// Create all slots in `registry`.
    pub fn create(registry: &mut ParamRegistry) -> Result<Self, ParamError> {
        let mut identity = [(IdentityField::SerialNumber, ParamId::default()); 6];
        for (slot, field) in identity.iter_mut().zip(IdentityField::ALL) {
            *slot = (field, registry.create(field.param_key(), ParamType::String)?);
        }

        Ok(Self {
            position: registry.create(MOTOR_POSITION, ParamType::Double)?,
            done: registry.create(MOTOR_STATUS_DONE, ParamType::Integer)?,
            moving: registry.create(MOTOR_STATUS_MOVING, ParamType::Integer)?,
            homed: registry.create(MOTOR_STATUS_HOMED, ParamType::Integer)?,
            problem: registry.create(MOTOR_STATUS_PROBLEM, ParamType::Integer)?,
            status: registry.create(MOTOR_STATUS, ParamType::Integer)?,
            closed_loop: registry.create(MOTOR_CLOSED_LOOP, ParamType::Integer)?,
            connected: registry.create(ATTOCUBE_CONNECTED, ParamType::Integer)?,
            identity,
        })
    }

    /// Store the identity strings under the controller scope.
    pub fn publish_identity(
        &self,
        registry: &mut ParamRegistry,
        snapshot: &IdentitySnapshot,
    ) -> Result<(), ParamError> {
        for (field, id) in self.identity {
            registry.set_string(ParamScope::Controller, id, snapshot.get(field))?;
        }
        Ok(())
    }

    /// Store position and status flags for one axis.
    pub fn publish_axis(
        &self,
        registry: &mut ParamRegistry,
        channel: usize,
        position: f64,
        flags: AxisStatusFlags,
    ) -> Result<(), ParamError> {
        let scope = ParamScope::Axis(channel);
        registry.set_double(scope, self.position, position)?;
        registry.set_integer(scope, self.done, flag(flags, AxisStatusFlags::DONE))?;
        registry.set_integer(scope, self.moving, flag(flags, AxisStatusFlags::MOVING))?;
        registry.set_integer(scope, self.homed, flag(flags, AxisStatusFlags::HOMED))?;
        registry.set_integer(scope, self.problem, flag(flags, AxisStatusFlags::PROBLEM))?;
        registry.set_integer(scope, self.status, i32::from(flags.bits()))
    }
}

fn flag(flags: AxisStatusFlags, bit: AxisStatusFlags) -> i32 {
    i32::from(flags.contains(bit))
}
