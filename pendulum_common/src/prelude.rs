//! Prelude module for common re-exports.
//!
//! ```rust
//! use pendulum_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, ControllerConfig, ControllerNodeConfig, LogLevel, ProcessSettings,
    SimulationConfig,
};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{DEFAULT_FEEDBACK_MATRIX, GAIN_COUNT, GRAVITY};

// ─── Data Types ─────────────────────────────────────────────────────
pub use crate::types::{
    DynamicPlantState, ForceCommand, PendulumProperties, PendulumState, TeleopSetpoint,
};

// ─── Plant ──────────────────────────────────────────────────────────
pub use crate::motor::{Actuator, ConstructionError};

// ─── Lifecycle ──────────────────────────────────────────────────────
pub use crate::lifecycle::{CallbackReturn, LifecycleState, Transition, TransitionRoute};
