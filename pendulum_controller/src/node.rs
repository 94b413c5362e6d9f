//! Pendulum controller node.
//!
//! Owns the controller, the lifecycle state, the deadline-miss counter and
//! the command publisher gate. One instance is created at startup and
//! shared by `Arc` between the RT thread (cycle path) and the executor
//! thread (teleoperation and lifecycle transitions).

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use pendulum_common::config::{ConfigError, ControllerNodeConfig};
use pendulum_common::lifecycle::{CallbackReturn, LifecycleState, Transition};
use pendulum_common::types::{PendulumState, TeleopSetpoint};
use static_assertions::assert_impl_all;
use thiserror::Error;
use tracing::info;

use crate::controller::{Controller, GainError, GainVector};
use crate::lifecycle::{LifecycleCallbacks, LifecycleStateMachine, TransitionError};
use crate::realtime::DeadlineMonitor;
use crate::transport::{CommandSink, LifecyclePublisher, PublisherGate};

/// Errors while building the node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gains(#[from] GainError),
}

// ─── Diagnostics ────────────────────────────────────────────────────

/// Point-in-time view of the controller for introspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSnapshot {
    pub state: PendulumState,
    pub teleop: TeleopSetpoint,
    pub force_command: f64,
    pub missed_deadlines: u64,
}

impl fmt::Display for ControllerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cart position = {:.6}", self.state.cart_position)?;
        writeln!(f, "Cart velocity = {:.6}", self.state.cart_velocity)?;
        writeln!(f, "Pole angle = {:.6}", self.state.pole_angle)?;
        writeln!(f, "Pole angular velocity = {:.6}", self.state.pole_velocity)?;
        writeln!(f, "Teleoperation cart position = {:.6}", self.teleop.cart_position)?;
        writeln!(f, "Teleoperation cart velocity = {:.6}", self.teleop.cart_velocity)?;
        writeln!(f, "Force command = {:.6}", self.force_command)?;
        write!(f, "Num missed deadlines = {}", self.missed_deadlines)
    }
}

// ─── Node ───────────────────────────────────────────────────────────

/// Channel names and timing taken from the configuration.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub state_topic_name: String,
    pub command_topic_name: String,
    pub teleop_topic_name: String,
    pub deadline: Duration,
    pub auto_start_node: bool,
}

impl From<&ControllerNodeConfig> for NodeSettings {
    fn from(config: &ControllerNodeConfig) -> Self {
        Self {
            state_topic_name: config.state_topic_name.clone(),
            command_topic_name: config.command_topic_name.clone(),
            teleop_topic_name: config.teleop_topic_name.clone(),
            deadline: config.deadline(),
            auto_start_node: config.auto_start_node,
        }
    }
}

/// Lifecycle-managed cart-pole controller.
pub struct PendulumControllerNode {
    settings: NodeSettings,
    controller: Controller,
    lifecycle: LifecycleStateMachine,
    deadline_monitor: DeadlineMonitor,
    command_gate: PublisherGate,
    /// Captured on every deactivate. Touched only by the executor thread.
    last_snapshot: Mutex<Option<ControllerSnapshot>>,
}

// Shared by `Arc` between the RT and executor threads.
assert_impl_all!(PendulumControllerNode: Send, Sync);

impl PendulumControllerNode {
    /// Build a node from a validated configuration.
    ///
    /// # Errors
    /// `NodeError::Config` if validation fails, `NodeError::Gains` if the
    /// feedback matrix does not have 4 entries.
    pub fn new(config: &ControllerNodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let gains = GainVector::from_slice(&config.controller.feedback_matrix)?;
        Ok(Self::with_settings(NodeSettings::from(config), gains))
    }

    pub fn with_settings(settings: NodeSettings, gains: GainVector) -> Self {
        info!(
            "Controller node created: state='{}', command='{}', teleop='{}', deadline={}us, gains={:?}",
            settings.state_topic_name,
            settings.command_topic_name,
            settings.teleop_topic_name,
            settings.deadline.as_micros(),
            gains.as_array()
        );
        Self {
            settings,
            controller: Controller::new(gains),
            lifecycle: LifecycleStateMachine::new(),
            deadline_monitor: DeadlineMonitor::new(),
            command_gate: PublisherGate::new(),
            last_snapshot: Mutex::new(None),
        }
    }

    #[inline]
    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    #[inline]
    pub fn deadline(&self) -> Duration {
        self.settings.deadline
    }

    #[inline]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[inline]
    pub fn deadline_monitor(&self) -> &DeadlineMonitor {
        &self.deadline_monitor
    }

    /// Current lifecycle state (lock-free).
    #[inline]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    #[inline]
    pub fn missed_deadlines(&self) -> u64 {
        self.deadline_monitor.missed()
    }

    /// Wrap `sink` in a publisher gated by this node's activation.
    pub fn create_command_publisher<S: CommandSink>(&self, sink: S) -> LifecyclePublisher<S> {
        LifecyclePublisher::new(
            sink,
            self.command_gate.clone(),
            &self.settings.command_topic_name,
        )
    }

    /// Teleoperation input. Executor thread only.
    pub fn set_teleop(&self, setpoint: TeleopSetpoint) {
        self.controller
            .set_teleop(setpoint.cart_position, setpoint.cart_velocity);
    }

    // ── Lifecycle ──

    /// Run one lifecycle transition. Executor thread only.
    pub fn trigger(&self, transition: Transition) -> Result<LifecycleState, TransitionError> {
        self.lifecycle.trigger(transition, self)
    }

    pub fn configure(&self) -> Result<LifecycleState, TransitionError> {
        self.trigger(Transition::Configure)
    }

    pub fn activate(&self) -> Result<LifecycleState, TransitionError> {
        self.trigger(Transition::Activate)
    }

    pub fn deactivate(&self) -> Result<LifecycleState, TransitionError> {
        self.trigger(Transition::Deactivate)
    }

    pub fn cleanup(&self) -> Result<LifecycleState, TransitionError> {
        self.trigger(Transition::Cleanup)
    }

    pub fn shutdown(&self) -> Result<LifecycleState, TransitionError> {
        self.trigger(Transition::Shutdown)
    }

    /// Configure and activate when `auto_start_node` is set.
    pub fn init(&self) -> Result<LifecycleState, TransitionError> {
        if self.settings.auto_start_node {
            info!("Auto-starting node");
            self.configure()?;
            self.activate()
        } else {
            Ok(self.lifecycle_state())
        }
    }

    /// Drive the node to `Finalized` from whatever primary state it is in.
    pub fn finalize(&self) -> Result<LifecycleState, TransitionError> {
        if self.lifecycle_state() == LifecycleState::Active {
            self.deactivate()?;
        }
        if self.lifecycle_state() == LifecycleState::Finalized {
            return Ok(LifecycleState::Finalized);
        }
        self.shutdown()
    }

    // ── Diagnostics ──

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.controller.get_state(),
            teleop: self.controller.get_teleop(),
            force_command: self.controller.get_force_command(),
            missed_deadlines: self.deadline_monitor.missed(),
        }
    }

    /// Snapshot taken by the most recent deactivate, if any.
    pub fn last_deactivation_snapshot(&self) -> Option<ControllerSnapshot> {
        *self
            .last_snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn log_controller_state(&self) -> ControllerSnapshot {
        let snapshot = self.snapshot();
        for line in snapshot.to_string().lines() {
            info!("{line}");
        }
        snapshot
    }
}

impl LifecycleCallbacks for PendulumControllerNode {
    fn on_configure(&self) -> CallbackReturn {
        info!("Configuring");
        self.controller.reset();
        CallbackReturn::Success
    }

    fn on_activate(&self) -> CallbackReturn {
        info!("Activating");
        self.command_gate.activate();
        CallbackReturn::Success
    }

    fn on_deactivate(&self) -> CallbackReturn {
        info!("Deactivating");
        self.command_gate.deactivate();
        let snapshot = self.log_controller_state();
        *self
            .last_snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        CallbackReturn::Success
    }

    fn on_cleanup(&self) -> CallbackReturn {
        info!("Cleaning up");
        CallbackReturn::Success
    }

    fn on_shutdown(&self) -> CallbackReturn {
        info!("Shutting down");
        self.command_gate.deactivate();
        CallbackReturn::Success
    }

    fn on_error(&self, failed: Transition) -> CallbackReturn {
        info!("Handling error after '{failed}'");
        self.command_gate.deactivate();
        CallbackReturn::Success
    }
}
