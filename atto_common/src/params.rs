//! Host parameter registry.
//!
//! Typed parameter slots (string, integer, double) created once by name.
//! Each slot is identified by a `ParamId`, the numeric "reason" the host uses
//! when it writes to the parameter. Values are stored per `ParamScope`, so the
//! same slot holds an independent value for the controller and for each axis.
//!
//! Setting a value that differs from the stored one marks it dirty.
//! `call_param_callbacks` hands every dirty value in a scope to the registered
//! listeners and clears the dirty set for that scope.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Host-assigned identifier ("reason") of a parameter slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(usize);

impl ParamId {
    /// Raw reason number.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value type of a parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Octet string
    String,
    /// 32-bit integer
    Integer,
    /// 64-bit float
    Double,
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Octet string
    String(String),
    /// 32-bit integer
    Integer(i32),
    /// 64-bit float
    Double(f64),
}

impl ParamValue {
    /// Type of this value.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::String(_) => ParamType::String,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Double(_) => ParamType::Double,
        }
    }
}

/// Address a parameter value is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamScope {
    /// Controller-wide value
    Controller,
    /// Value belonging to one axis
    Axis(usize),
}

/// Error types for parameter registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// No slot with this id
    #[error("unknown parameter {0}")]
    UnknownParam(ParamId),

    /// A slot with this name already exists
    #[error("parameter '{0}' already exists")]
    Duplicate(String),

    /// Value type does not match the slot type
    #[error("parameter '{name}' expects {expected:?}, got {found:?}")]
    TypeMismatch {
        /// Slot name
        name: String,
        /// Slot type
        expected: ParamType,
        /// Type of the rejected value
        found: ParamType,
    },
}

/// One changed value delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    /// Slot id
    pub id: ParamId,
    /// Slot name
    pub name: String,
    /// New value
    pub value: ParamValue,
}

/// Change listener. Invoked with the scope and the values that changed in it.
///
/// Listeners run while the owner of the registry holds its lock and must not
/// call back into that owner.
pub type ParamListener = Box<dyn Fn(ParamScope, &[ParamUpdate]) + Send + Sync>;

#[derive(Debug)]
struct ParamDef {
    name: String,
    param_type: ParamType,
}

/// Registry of typed parameter slots and their per-scope values.
#[derive(Default)]
pub struct ParamRegistry {
    defs: Vec<ParamDef>,
    values: BTreeMap<(ParamScope, ParamId), ParamValue>,
    dirty: BTreeSet<(ParamScope, ParamId)>,
    listeners: Vec<ParamListener>,
}

impl ParamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parameter slot.
    ///
    /// # Errors
    /// Returns `ParamError::Duplicate` if the name is already taken.
    pub fn create(&mut self, name: &str, param_type: ParamType) -> Result<ParamId, ParamError> {
        if self.find(name).is_some() {
            return Err(ParamError::Duplicate(name.to_string()));
        }
        let id = ParamId(self.defs.len());
        self.defs.push(ParamDef {
            name: name.to_string(),
            param_type,
        });
        Ok(id)
    }

    /// Look up a slot by name.
    pub fn find(&self, name: &str) -> Option<ParamId> {
        self.defs.iter().position(|d| d.name == name).map(ParamId)
    }

    /// Name of a slot.
    pub fn name(&self, id: ParamId) -> Option<&str> {
        self.defs.get(id.0).map(|d| d.name.as_str())
    }

    /// Type of a slot.
    pub fn param_type(&self, id: ParamId) -> Option<ParamType> {
        self.defs.get(id.0).map(|d| d.param_type)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True if no slots have been created.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Store a string value.
    pub fn set_string(&mut self, scope: ParamScope, id: ParamId, value: &str) -> Result<(), ParamError> {
        self.set(scope, id, ParamValue::String(value.to_string()))
    }

    /// Store an integer value.
    pub fn set_integer(&mut self, scope: ParamScope, id: ParamId, value: i32) -> Result<(), ParamError> {
        self.set(scope, id, ParamValue::Integer(value))
    }

    /// Store a double value.
    pub fn set_double(&mut self, scope: ParamScope, id: ParamId, value: f64) -> Result<(), ParamError> {
        self.set(scope, id, ParamValue::Double(value))
    }

    /// Store a value, marking it dirty if it changed.
    ///
    /// # Errors
    /// Returns `ParamError::UnknownParam` for an unknown id and
    /// `ParamError::TypeMismatch` if the value type differs from the slot type.
    /// The stored value is untouched on error.
    pub fn set(&mut self, scope: ParamScope, id: ParamId, value: ParamValue) -> Result<(), ParamError> {
        let def = self.defs.get(id.0).ok_or(ParamError::UnknownParam(id))?;
        if def.param_type != value.param_type() {
            return Err(ParamError::TypeMismatch {
                name: def.name.clone(),
                expected: def.param_type,
                found: value.param_type(),
            });
        }

        let key = (scope, id);
        if self.values.get(&key) != Some(&value) {
            self.values.insert(key, value);
            self.dirty.insert(key);
        }
        Ok(())
    }

    /// Stored value, if any.
    pub fn get(&self, scope: ParamScope, id: ParamId) -> Option<&ParamValue> {
        self.values.get(&(scope, id))
    }

    /// Stored string value, if set.
    pub fn get_string(&self, scope: ParamScope, id: ParamId) -> Option<&str> {
        match self.get(scope, id) {
            Some(ParamValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Stored integer value, if set.
    pub fn get_integer(&self, scope: ParamScope, id: ParamId) -> Option<i32> {
        match self.get(scope, id) {
            Some(ParamValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// Stored double value, if set.
    pub fn get_double(&self, scope: ParamScope, id: ParamId) -> Option<f64> {
        match self.get(scope, id) {
            Some(ParamValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    /// Register a change listener.
    pub fn add_listener(&mut self, listener: ParamListener) {
        self.listeners.push(listener);
    }

    /// Deliver dirty values in `scope` to all listeners.
    ///
    /// Returns the number of updates delivered. Nothing is delivered (and no
    /// listener is called) when the scope has no pending changes.
    pub fn call_param_callbacks(&mut self, scope: ParamScope) -> usize {
        let pending: Vec<_> = self
            .dirty
            .iter()
            .filter(|(s, _)| *s == scope)
            .copied()
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let updates: Vec<ParamUpdate> = pending
            .iter()
            .filter_map(|key| {
                let value = self.values.get(key)?.clone();
                let name = self.defs.get(key.1.0)?.name.clone();
                Some(ParamUpdate {
                    id: key.1,
                    name,
                    value,
                })
            })
            .collect();

        for key in &pending {
            self.dirty.remove(key);
        }
        for listener in &self.listeners {
            listener(scope, &updates);
        }
        updates.len()
    }
}

impl fmt::Debug for ParamRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamRegistry")
            .field("defs", &self.defs)
            .field("values", &self.values)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
