//! # Pendulum Motor
//!
//! Plant variants implementing [`pendulum_common::motor::Actuator`].
//!
//! Currently only the simulated joint ([`sim::MotorSim`]) is provided. A
//! hardware-backed variant plugs in behind the same trait.

pub mod sim;

pub use sim::MotorSim;
