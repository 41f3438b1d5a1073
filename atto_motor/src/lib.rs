//! # Attocube Motor Adapter Library
//!
//! Drives multi-axis piezo positioner controllers over a device handle and
//! exposes per-axis move/stop/home/poll to a motor host framework.
//!
//! # Module Structure
//!
//! - [`controller`] - Controller: device ownership, teardown, parameter writes
//! - [`axis`] - Per-channel operations and cached status
//! - [`motor_params`] - Parameter slots published to the host
//! - [`config`] - Adapter configuration (TOML)
//! - [`port_registry`] - Administrative entry point, owns controllers by port name
//! - [`driver_registry`] - Device driver factory registration
//! - [`drivers`] - Device driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PortRegistry                                                │
//! │   └── Controller ──────────────┐                             │
//! │        ├── Axis 0..n (Weak)    │ Arc<ControllerShared>       │
//! │        └── PollLoop thread ────┤                             │
//! │                                ▼                             │
//! │                 Mutex<ControllerState>                       │
//! │                  ├── Option<Box<dyn DeviceHandle>>           │
//! │                  ├── AxisState cache (per channel)           │
//! │                  └── ParamRegistry                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod axis;
mod best_effort;
pub mod config;
pub mod controller;
pub mod driver_registry;
pub mod drivers;
pub mod motor_params;
mod poll;
pub mod port_registry;

// Re-export key types for convenience
pub use crate::axis::Axis;
pub use crate::controller::{Controller, ControllerSnapshot, ControllerTiming};
pub use crate::driver_registry::DriverRegistry;
pub use crate::port_registry::PortRegistry;
