//! Non-real-time executor (thread E).
//!
//! Services teleoperation setpoints and lifecycle transition requests posted
//! through an [`ExecutorHandle`]. Lifecycle state is written only here. On
//! shutdown the executor drives the node to `Finalized`.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, unbounded};
use pendulum_common::lifecycle::{LifecycleState, Transition};
use pendulum_common::types::TeleopSetpoint;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::lifecycle::TransitionError;
use crate::node::PendulumControllerNode;
use crate::wait_set::ShutdownSignal;

/// Poll interval once every handle is gone and only shutdown can arrive.
const ORPHAN_POLL: Duration = Duration::from_millis(100);

/// Work item for the executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutorEvent {
    /// New teleoperation reference.
    Teleop(TeleopSetpoint),
    /// Lifecycle transition request.
    Transition(Transition),
    /// Configure and activate if the node is set to auto-start.
    Init,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("executor is not running")]
pub struct ExecutorGone;

/// Cloneable sender side of the executor queue.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    tx: Sender<ExecutorEvent>,
}

impl ExecutorHandle {
    pub fn send_teleop(&self, cart_position: f64, cart_velocity: f64) -> Result<(), ExecutorGone> {
        self.send(ExecutorEvent::Teleop(TeleopSetpoint::new(
            cart_position,
            cart_velocity,
        )))
    }

    pub fn request_transition(&self, transition: Transition) -> Result<(), ExecutorGone> {
        self.send(ExecutorEvent::Transition(transition))
    }

    pub fn request_init(&self) -> Result<(), ExecutorGone> {
        self.send(ExecutorEvent::Init)
    }

    fn send(&self, event: ExecutorEvent) -> Result<(), ExecutorGone> {
        self.tx.send(event).map_err(|_| ExecutorGone)
    }
}

/// Executor owning the event queue.
pub struct Executor {
    node: Arc<PendulumControllerNode>,
    events: Receiver<ExecutorEvent>,
    shutdown: ShutdownSignal,
    handled: u64,
}

impl Executor {
    pub fn new(node: Arc<PendulumControllerNode>, shutdown: ShutdownSignal) -> (Self, ExecutorHandle) {
        let (tx, events) = unbounded();
        let executor = Self {
            node,
            events,
            shutdown,
            handled: 0,
        };
        (executor, ExecutorHandle { tx })
    }

    /// Process events until shutdown, then finalize the node.
    ///
    /// # Errors
    /// Propagates a failure of the final transition to `Finalized`.
    pub fn spin(mut self) -> Result<LifecycleState, TransitionError> {
        info!("Executor started");
        let events = self.events.clone();
        let wake = self.shutdown.wake_receiver().clone();
        let mut select = Select::new();
        let events_index = select.recv(&events);
        select.recv(&wake);

        while !self.shutdown.is_triggered() {
            if select.ready() != events_index {
                continue;
            }
            match events.try_recv() {
                Ok(event) => self.dispatch(event),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    debug!("All executor handles dropped; waiting for shutdown");
                    while !self.shutdown.wait_timeout(ORPHAN_POLL) {}
                }
            }
        }

        info!("Executor stopping after {} events", self.handled);
        self.node.finalize()
    }

    /// Handle every queued event without blocking.
    pub fn spin_some(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events.try_recv() {
            self.dispatch(event);
            count += 1;
        }
        count
    }

    fn dispatch(&mut self, event: ExecutorEvent) {
        self.handled += 1;
        match event {
            ExecutorEvent::Teleop(setpoint) => {
                debug!(
                    "Teleop setpoint: position={}, velocity={}",
                    setpoint.cart_position, setpoint.cart_velocity
                );
                self.node.set_teleop(setpoint);
            }
            ExecutorEvent::Transition(transition) => match self.node.trigger(transition) {
                Ok(state) => info!("Transition '{transition}' complete, now {state}"),
                Err(e) => warn!("Transition '{transition}' rejected: {e}"),
            },
            ExecutorEvent::Init => {
                if let Err(e) = self.node.init() {
                    warn!("Auto-start failed: {e}");
                }
            }
        }
    }
}
