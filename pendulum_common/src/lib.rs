//! Pendulum Common Library
//!
//! Shared types, constants and configuration loading used by every crate in
//! the pendulum control workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Physical constants and parameter defaults
//! - [`types`] - Sensor, setpoint, command and plant data types
//! - [`motor`] - `Actuator` trait and plant construction errors
//! - [`lifecycle`] - Lifecycle states and transitions
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pendulum_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod lifecycle;
pub mod motor;
pub mod prelude;
pub mod types;
