//! Lifecycle states and transitions.
//!
//! All enums use `#[repr(u8)]` so the current state fits in an `AtomicU8`
//! and can be read by the real-time thread without locking.
//!
//! ```text
//! Unconfigured ─configure─▶ Configuring ─▶ Inactive
//! Inactive     ─activate──▶ Activating  ─▶ Active
//! Active       ─deactivate▶ Deactivating ▶ Inactive
//! Inactive     ─cleanup───▶ CleaningUp  ─▶ Unconfigured
//! Unconfigured/Inactive/Active ─shutdown─▶ ShuttingDown ─▶ Finalized
//! ```

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

// ─── States ─────────────────────────────────────────────────────────

/// Lifecycle state of the controller node.
///
/// Primary states are stable; transitional states exist only while a
/// transition callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LifecycleState {
    /// Created, nothing configured.
    Unconfigured = 1,
    /// Configured, command output disabled.
    Inactive = 2,
    /// Running, command output enabled.
    Active = 3,
    /// Terminal state.
    Finalized = 4,
    /// Running the configure callback.
    Configuring = 10,
    /// Running the cleanup callback.
    CleaningUp = 11,
    /// Running the shutdown callback.
    ShuttingDown = 12,
    /// Running the activate callback.
    Activating = 13,
    /// Running the deactivate callback.
    Deactivating = 14,
    /// Running the error handler after a callback error.
    ErrorProcessing = 15,
}

const_assert_eq!(core::mem::size_of::<LifecycleState>(), 1);

impl LifecycleState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Unconfigured),
            2 => Some(Self::Inactive),
            3 => Some(Self::Active),
            4 => Some(Self::Finalized),
            10 => Some(Self::Configuring),
            11 => Some(Self::CleaningUp),
            12 => Some(Self::ShuttingDown),
            13 => Some(Self::Activating),
            14 => Some(Self::Deactivating),
            15 => Some(Self::ErrorProcessing),
            _ => None,
        }
    }

    /// True for Unconfigured, Inactive, Active and Finalized.
    #[inline]
    pub const fn is_primary(self) -> bool {
        matches!(
            self,
            Self::Unconfigured | Self::Inactive | Self::Active | Self::Finalized
        )
    }

    /// Lower-case label used in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Finalized => "finalized",
            Self::Configuring => "configuring",
            Self::CleaningUp => "cleaningup",
            Self::ShuttingDown => "shuttingdown",
            Self::Activating => "activating",
            Self::Deactivating => "deactivating",
            Self::ErrorProcessing => "errorprocessing",
        }
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Unconfigured
    }
}

impl core::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Transitions ────────────────────────────────────────────────────

/// Externally requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Configure,
    Cleanup,
    Activate,
    Deactivate,
    Shutdown,
}

/// Path taken by a valid transition: start → intermediate → goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRoute {
    /// Primary state the transition starts from.
    pub start: LifecycleState,
    /// Transitional state held while the callback runs.
    pub intermediate: LifecycleState,
    /// Primary state reached on success.
    pub goal: LifecycleState,
}

impl Transition {
    /// Look up the route for this transition from `from`.
    ///
    /// Returns `None` if the transition is not valid in that state.
    pub const fn route(self, from: LifecycleState) -> Option<TransitionRoute> {
        use LifecycleState::*;

        let (intermediate, goal) = match (self, from) {
            (Self::Configure, Unconfigured) => (Configuring, Inactive),
            (Self::Cleanup, Inactive) => (CleaningUp, Unconfigured),
            (Self::Activate, Inactive) => (Activating, Active),
            (Self::Deactivate, Active) => (Deactivating, Inactive),
            (Self::Shutdown, Unconfigured | Inactive | Active) => (ShuttingDown, Finalized),
            _ => return None,
        };

        Some(TransitionRoute {
            start: from,
            intermediate,
            goal,
        })
    }

    /// Lower-case label used in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Cleanup => "cleanup",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Shutdown => "shutdown",
        }
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome reported by a transition callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackReturn {
    /// Advance to the goal state.
    Success,
    /// Return to the start state.
    Failure,
    /// Enter `ErrorProcessing`.
    Error,
}
