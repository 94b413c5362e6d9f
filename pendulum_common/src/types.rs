//! Data types exchanged between the sensor source, the controller, the
//! command sink and the plant simulator.
//!
//! All types are `Copy` plain-old-data so they can cross thread boundaries
//! by value without allocation.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_PENDULUM_LENGTH, DEFAULT_PENDULUM_MASS};

// ─── Sensor / Setpoint / Command ────────────────────────────────────

/// One sensor snapshot of the cart-pole, captured once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PendulumState {
    /// Cart position [m].
    pub cart_position: f64,
    /// Cart velocity [m/s].
    pub cart_velocity: f64,
    /// Pole angle from upright [rad].
    pub pole_angle: f64,
    /// Pole angular velocity [rad/s].
    pub pole_velocity: f64,
}

impl PendulumState {
    /// Construct from the four measured quantities.
    pub const fn new(cart_position: f64, cart_velocity: f64, pole_angle: f64, pole_velocity: f64) -> Self {
        Self {
            cart_position,
            cart_velocity,
            pole_angle,
            pole_velocity,
        }
    }

    /// Pack into `[cart_position, cart_velocity, pole_angle, pole_velocity]`.
    #[inline]
    pub const fn to_array(self) -> [f64; 4] {
        [
            self.cart_position,
            self.cart_velocity,
            self.pole_angle,
            self.pole_velocity,
        ]
    }

    /// Inverse of [`PendulumState::to_array`].
    #[inline]
    pub const fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }
}

/// Latest operator setpoint for the cart.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TeleopSetpoint {
    /// Desired cart position [m].
    pub cart_position: f64,
    /// Desired cart velocity [m/s].
    pub cart_velocity: f64,
}

impl TeleopSetpoint {
    pub const fn new(cart_position: f64, cart_velocity: f64) -> Self {
        Self {
            cart_position,
            cart_velocity,
        }
    }
}

/// Scalar force command produced by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForceCommand {
    /// Force applied to the cart [N].
    pub force: f64,
}

// ─── Plant ──────────────────────────────────────────────────────────

/// Physical constants of the simulated pendulum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendulumProperties {
    /// Mass of the bob at the end of the pole [kg].
    pub mass: f64,
    /// Pole length [m].
    pub length: f64,
}

impl Default for PendulumProperties {
    fn default() -> Self {
        Self {
            mass: DEFAULT_PENDULUM_MASS,
            length: DEFAULT_PENDULUM_LENGTH,
        }
    }
}

/// Integrated state of the simulated joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DynamicPlantState {
    /// Angle from the ground [rad], always within [0, π].
    pub position: f64,
    /// Angular velocity [rad/s].
    pub velocity: f64,
    /// Angular acceleration [rad/s²].
    pub acceleration: f64,
    /// Torque on the joint [N·m]. Nothing drives it; kept for the dynamics term.
    pub torque: f64,
}
