//! Lifecycle state machine driving configuration and activation.
//!
//! Implements the transition table in [`pendulum_common::lifecycle`] with
//! all-or-nothing semantics:
//! - callback `Success` → goal state;
//! - callback `Failure` → back to the start state;
//! - callback `Error` → `ErrorProcessing`, then `on_error` decides between
//!   `Unconfigured` (handled) and `Finalized` (unhandled).
//!
//! Transitions are requested one at a time by the executor thread. The
//! current state lives in an `AtomicU8` so the RT thread can read it once
//! per cycle without locking.

use core::sync::atomic::{AtomicU8, Ordering};

use pendulum_common::lifecycle::{CallbackReturn, LifecycleState, Transition};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a transition did not reach its goal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Transition not valid from the current state. State unchanged.
    #[error("transition '{transition}' is not valid from state '{state}'")]
    InvalidTransition {
        transition: Transition,
        state: LifecycleState,
    },

    /// Callback reported failure; state returned to `state`.
    #[error("transition '{transition}' failed, remaining in '{state}'")]
    CallbackFailure {
        transition: Transition,
        state: LifecycleState,
    },

    /// Callback raised an error; error handling left the node in `state`.
    #[error("transition '{transition}' raised an error, recovered to '{state}'")]
    CallbackError {
        transition: Transition,
        state: LifecycleState,
    },
}

/// Per-transition hooks. Every hook defaults to `Success`.
pub trait LifecycleCallbacks {
    fn on_configure(&self) -> CallbackReturn {
        CallbackReturn::Success
    }

    fn on_activate(&self) -> CallbackReturn {
        CallbackReturn::Success
    }

    fn on_deactivate(&self) -> CallbackReturn {
        CallbackReturn::Success
    }

    fn on_cleanup(&self) -> CallbackReturn {
        CallbackReturn::Success
    }

    fn on_shutdown(&self) -> CallbackReturn {
        CallbackReturn::Success
    }

    /// Called in `ErrorProcessing` after another hook returned `Error`.
    /// `Success` recovers to `Unconfigured`; anything else finalizes.
    fn on_error(&self, _failed: Transition) -> CallbackReturn {
        CallbackReturn::Success
    }
}

/// Lifecycle state holder.
#[derive(Debug)]
pub struct LifecycleStateMachine {
    state: AtomicU8,
}

impl LifecycleStateMachine {
    /// Create a state machine in `Unconfigured`.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Unconfigured as u8),
        }
    }

    /// Current state. Lock-free; safe on the RT thread.
    #[inline]
    pub fn current(&self) -> LifecycleState {
        // Only valid discriminants are ever stored.
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
            .unwrap_or(LifecycleState::Finalized)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.current() == LifecycleState::Active
    }

    /// Run `transition` against `callbacks`.
    ///
    /// Callers must serialize transitions; the state machine does not.
    ///
    /// # Errors
    /// See [`TransitionError`]. On every error path the state is a primary
    /// state and no partial transition is left behind.
    pub fn trigger<C>(&self, transition: Transition, callbacks: &C) -> Result<LifecycleState, TransitionError>
    where
        C: LifecycleCallbacks + ?Sized,
    {
        let from = self.current();
        let Some(route) = transition.route(from) else {
            warn!("Rejected lifecycle transition '{transition}' from '{from}'");
            return Err(TransitionError::InvalidTransition {
                transition,
                state: from,
            });
        };

        debug!("Lifecycle: {} -> {}", route.start, route.intermediate);
        self.set(route.intermediate);

        let outcome = match transition {
            Transition::Configure => callbacks.on_configure(),
            Transition::Activate => callbacks.on_activate(),
            Transition::Deactivate => callbacks.on_deactivate(),
            Transition::Cleanup => callbacks.on_cleanup(),
            Transition::Shutdown => callbacks.on_shutdown(),
        };

        match outcome {
            CallbackReturn::Success => {
                self.set(route.goal);
                info!("Lifecycle transition '{transition}': {} -> {}", route.start, route.goal);
                Ok(route.goal)
            }
            CallbackReturn::Failure => {
                self.set(route.start);
                warn!("Lifecycle transition '{transition}' failed, back to '{}'", route.start);
                Err(TransitionError::CallbackFailure {
                    transition,
                    state: route.start,
                })
            }
            CallbackReturn::Error => {
                self.set(LifecycleState::ErrorProcessing);
                let recovered = match callbacks.on_error(transition) {
                    CallbackReturn::Success => LifecycleState::Unconfigured,
                    CallbackReturn::Failure | CallbackReturn::Error => LifecycleState::Finalized,
                };
                self.set(recovered);
                warn!("Lifecycle transition '{transition}' raised an error, now '{recovered}'");
                Err(TransitionError::CallbackError {
                    transition,
                    state: recovered,
                })
            }
        }
    }

    #[inline]
    fn set(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for LifecycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
