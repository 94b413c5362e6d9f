//! Configuration loading traits and types.
//!
//! Every parameter has a default so an empty file (or no file at all) yields
//! the nominal demo configuration.
//!
//! # TOML Example
//!
//! ```toml
//! state_topic_name = "pendulum_joint_states"
//! deadline_us = 2000
//! auto_start_node = true
//!
//! [controller]
//! feedback_matrix = [-10.0, -51.5393, 356.8637, 154.4146]
//!
//! [proc_settings]
//! lock_memory = true
//! process_priority = 80
//! cpu_affinity = 4
//! lock_memory_size_mb = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    DEFAULT_COMMAND_TOPIC, DEFAULT_DEADLINE_US, DEFAULT_FEEDBACK_MATRIX, DEFAULT_PENDULUM_LENGTH,
    DEFAULT_PENDULUM_MASS, DEFAULT_SIM_PERIOD_US, DEFAULT_STATE_TOPIC, DEFAULT_TELEOP_TOPIC,
    GAIN_COUNT, MAX_PROCESS_PRIORITY,
};
use crate::types::PendulumProperties;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ─── Controller Node ────────────────────────────────────────────────

/// Top-level controller node configuration.
///
/// Loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerNodeConfig {
    /// Logging verbosity.
    pub log_level: LogLevel,
    /// Inbound sensor channel name.
    pub state_topic_name: String,
    /// Outbound force command channel name.
    pub command_topic_name: String,
    /// Teleoperation channel name.
    pub teleop_topic_name: String,
    /// Maximum wait for a new sample before a deadline is missed [µs].
    pub deadline_us: u64,
    /// Configure and activate the node right after startup.
    pub auto_start_node: bool,
    /// Control law parameters.
    pub controller: ControllerConfig,
    /// Process-level real-time settings.
    pub proc_settings: ProcessSettings,
    /// In-process plant used by `--simulate`.
    pub simulation: SimulationConfig,
}

impl Default for ControllerNodeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            state_topic_name: DEFAULT_STATE_TOPIC.to_string(),
            command_topic_name: DEFAULT_COMMAND_TOPIC.to_string(),
            teleop_topic_name: DEFAULT_TELEOP_TOPIC.to_string(),
            deadline_us: DEFAULT_DEADLINE_US,
            auto_start_node: false,
            controller: ControllerConfig::default(),
            proc_settings: ProcessSettings::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ControllerNodeConfig {
    /// Deadline as a `Duration`.
    #[inline]
    pub fn deadline(&self) -> Duration {
        Duration::from_micros(self.deadline_us)
    }

    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `deadline_us` is zero
    /// - a channel name is empty
    /// - any nested section is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deadline_us == 0 {
            return Err(ConfigError::ValidationError(
                "deadline_us must be greater than zero".to_string(),
            ));
        }
        for (field, name) in [
            ("state_topic_name", &self.state_topic_name),
            ("command_topic_name", &self.command_topic_name),
            ("teleop_topic_name", &self.teleop_topic_name),
        ] {
            if name.is_empty() {
                return Err(ConfigError::ValidationError(format!("{field} cannot be empty")));
            }
        }
        self.controller.validate()?;
        self.proc_settings.validate()?;
        self.simulation.validate()
    }
}

/// Control law parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// State-feedback gains [position, velocity, angle, angular velocity].
    pub feedback_matrix: Vec<f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            feedback_matrix: DEFAULT_FEEDBACK_MATRIX.to_vec(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feedback_matrix.len() != GAIN_COUNT {
            return Err(ConfigError::ValidationError(format!(
                "controller.feedback_matrix must have {GAIN_COUNT} entries, got {}",
                self.feedback_matrix.len()
            )));
        }
        if let Some(bad) = self.feedback_matrix.iter().find(|g| !g.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "controller.feedback_matrix contains non-finite gain {bad}"
            )));
        }
        Ok(())
    }
}

/// Process-level real-time settings.
///
/// Applied before the control loop starts; the loop itself only relies on
/// their effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcessSettings {
    /// Lock current and future pages into RAM.
    pub lock_memory: bool,
    /// `SCHED_FIFO` priority; 0 keeps the default scheduler.
    pub process_priority: u16,
    /// CPU bitmask for the real-time thread; 0 keeps the default affinity.
    pub cpu_affinity: u16,
    /// Heap to pre-fault after locking [MiB].
    pub lock_memory_size_mb: u16,
    /// Apply priority and affinity to the whole process so every spawned
    /// thread inherits them.
    pub configure_child_threads: bool,
}

impl ProcessSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_priority > MAX_PROCESS_PRIORITY {
            return Err(ConfigError::ValidationError(format!(
                "proc_settings.process_priority {} out of range [0, {MAX_PROCESS_PRIORITY}]",
                self.process_priority
            )));
        }
        Ok(())
    }
}

/// Parameters of the in-process plant loopback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Integration and sample publish period [µs].
    pub period_us: u64,
    /// Pendulum bob mass [kg].
    pub mass: f64,
    /// Pendulum length [m].
    pub length: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period_us: DEFAULT_SIM_PERIOD_US,
            mass: DEFAULT_PENDULUM_MASS,
            length: DEFAULT_PENDULUM_LENGTH,
        }
    }
}

impl SimulationConfig {
    /// Period as a `Duration`.
    #[inline]
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    /// Physical properties for the simulator.
    #[inline]
    pub fn properties(&self) -> PendulumProperties {
        PendulumProperties {
            mass: self.mass,
            length: self.length,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_us == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.period_us must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [("mass", self.mass), ("length", self.length)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ─── Loader ─────────────────────────────────────────────────────────

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
