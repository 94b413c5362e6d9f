//! Actuator trait and plant construction errors.
//!
//! This module defines:
//! - `Actuator` trait - Interface shared by simulated and hardware-backed plants
//! - `ConstructionError` enum - Fatal errors raised while building a plant
//!
//! # Timing Contracts
//!
//! | Operation | Max Duration | RT Constraint |
//! |-----------|--------------|---------------|
//! | construction | unbounded | None (pre-RT) |
//! | `update_motor_command()` | O(1) | **HARD** |
//! | `update_motor_state()` | O(1) | **HARD** |
//! | `get_position()` / `get_velocity()` | O(1) | **HARD** |

use thiserror::Error;

/// Errors raised while constructing a plant. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    /// Integration timestep is zero, NaN or infinite.
    #[error("invalid integration timestep: {dt} s")]
    InvalidTimestep {
        /// Offending timestep [s].
        dt: f64,
    },

    /// Physical property is not a positive finite number.
    #[error("invalid pendulum property {name}: {value}")]
    InvalidProperty {
        /// Property name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Capability implemented by every plant variant.
///
/// The variant is selected once at construction; all variants expose the
/// same contract. Implementations must be deterministic and must not
/// allocate or block in any of these methods.
pub trait Actuator: Send {
    /// Apply a commanded joint position [rad].
    fn update_motor_command(&mut self, commanded_position: f64);

    /// Advance the plant by one timestep.
    fn update_motor_state(&mut self);

    /// Current joint position [rad].
    fn get_position(&self) -> f64;

    /// Current joint velocity [rad/s].
    fn get_velocity(&self) -> f64;
}
