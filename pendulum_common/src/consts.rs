//! Workspace-wide constants.
//!
//! Single source of truth for physical constants and parameter defaults.

use static_assertions::const_assert_eq;

/// Standard gravity [m/s²].
pub const GRAVITY: f64 = 9.806_65;

/// Number of state-feedback gains: [position, velocity, angle, angular velocity].
pub const GAIN_COUNT: usize = 4;

/// Default feedback matrix for the nominal cart-pole.
pub const DEFAULT_FEEDBACK_MATRIX: [f64; GAIN_COUNT] = [-10.0, -51.5393, 356.8637, 154.4146];

const_assert_eq!(DEFAULT_FEEDBACK_MATRIX.len(), GAIN_COUNT);

/// Default deadline for a new state sample [µs].
pub const DEFAULT_DEADLINE_US: u64 = 2000;

/// Default plant simulation period [µs] (1 kHz).
pub const DEFAULT_SIM_PERIOD_US: u64 = 1000;

/// Default pendulum bob mass [kg].
pub const DEFAULT_PENDULUM_MASS: f64 = 0.01;

/// Default pendulum length [m].
pub const DEFAULT_PENDULUM_LENGTH: f64 = 0.5;

/// Highest `SCHED_FIFO` priority accepted by the process settings.
pub const MAX_PROCESS_PRIORITY: u16 = 99;

/// Default inbound sensor channel name.
pub const DEFAULT_STATE_TOPIC: &str = "pendulum_joint_states";

/// Default outbound force command channel name.
pub const DEFAULT_COMMAND_TOPIC: &str = "joint_command";

/// Default teleoperation channel name.
pub const DEFAULT_TELEOP_TOPIC: &str = "teleop";
