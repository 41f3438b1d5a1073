//! Atto Common Library
//!
//! Shared vocabulary for the Attocube motor adapter workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric limits, default timings and paths
//! - [`config`] - Configuration loading traits and types
//! - [`device`] - Device handle contract (vendor transport boundary)
//! - [`motor`] - Host motor-framework contract and motor errors
//! - [`params`] - Host parameter registry
//! - [`prelude`] - Common re-exports for convenience

#![deny(missing_docs)]

pub mod config;
pub mod consts;
pub mod device;
pub mod motor;
pub mod params;
pub mod prelude;
