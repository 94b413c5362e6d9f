//! Simulated pendulum joint.
//!
//! Idealized actuator: a position command moves the joint instantly. Between
//! commands the joint falls under gravity, integrated with forward Euler at a
//! fixed timestep derived from the control period.
//!
//! The torque term of the dynamics is part of the plant state but no command
//! path writes it; it stays at its initial value.

use std::f64::consts::PI;
use std::time::Duration;

use pendulum_common::consts::GRAVITY;
use pendulum_common::motor::{Actuator, ConstructionError};
use pendulum_common::types::{DynamicPlantState, PendulumProperties};
use tracing::{debug, trace};

/// Simulated revolute joint of the pendulum.
#[derive(Debug, Clone)]
pub struct MotorSim {
    /// Period the timestep was derived from.
    period: Duration,
    /// Integration timestep [s].
    dt: f64,
    /// Physical constants.
    properties: PendulumProperties,
    /// Integrated joint state.
    state: DynamicPlantState,
}

impl MotorSim {
    /// Create a simulator stepping once per `period`.
    ///
    /// # Errors
    /// `ConstructionError::InvalidTimestep` if the period is zero.
    /// `ConstructionError::InvalidProperty` if mass or length is not positive.
    pub fn new(period: Duration, properties: PendulumProperties) -> Result<Self, ConstructionError> {
        let dt = period.as_nanos() as f64 / 1_000_000_000.0;
        let mut sim = Self::with_timestep(dt, properties)?;
        sim.period = period;
        Ok(sim)
    }

    /// Create a simulator from a raw timestep in seconds.
    ///
    /// # Errors
    /// `ConstructionError::InvalidTimestep` if `dt` is zero, negative, NaN or infinite.
    /// `ConstructionError::InvalidProperty` if mass or length is not positive.
    pub fn with_timestep(dt: f64, properties: PendulumProperties) -> Result<Self, ConstructionError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ConstructionError::InvalidTimestep { dt });
        }
        for (name, value) in [("mass", properties.mass), ("length", properties.length)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConstructionError::InvalidProperty { name, value });
            }
        }

        debug!(
            "MotorSim created: dt={dt}s, mass={}kg, length={}m",
            properties.mass, properties.length
        );

        Ok(Self {
            period: Duration::try_from_secs_f64(dt).unwrap_or(Duration::MAX),
            dt,
            properties,
            state: DynamicPlantState::default(),
        })
    }

    /// Integration timestep [s].
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Period the timestep was derived from.
    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[inline]
    pub fn properties(&self) -> PendulumProperties {
        self.properties
    }

    /// Full integrated state (diagnostics).
    #[inline]
    pub fn state(&self) -> DynamicPlantState {
        self.state
    }
}

impl Actuator for MotorSim {
    fn update_motor_command(&mut self, commanded_position: f64) {
        self.state.position = clamp_joint(commanded_position);
    }

    fn update_motor_state(&mut self) {
        let PendulumProperties { mass, length } = self.properties;
        let s = &mut self.state;

        s.acceleration =
            GRAVITY * (s.position - PI / 2.0).sin() / length + s.torque / (mass * length * length);
        s.velocity += s.acceleration * self.dt;
        s.position = clamp_joint(s.position + s.velocity * self.dt);

        trace!(
            "MotorSim: pos={:.4}, vel={:.4}, acc={:.4}",
            s.position, s.velocity, s.acceleration
        );
    }

    #[inline]
    fn get_position(&self) -> f64 {
        self.state.position
    }

    #[inline]
    fn get_velocity(&self) -> f64 {
        self.state.velocity
    }
}

/// Joint limits: the pole cannot pass through the ground.
#[inline]
fn clamp_joint(position: f64) -> f64 {
    if position > PI {
        PI
    } else if position < 0.0 {
        0.0
    } else {
        position
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
