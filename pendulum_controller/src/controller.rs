//! Linear state-feedback control law.
//!
//! `force = -(g0·(x - x_ref) + g1·(ẋ - ẋ_ref) + g2·θ + g3·θ̇)`
//!
//! The controller is shared between two threads:
//! - the RT thread calls [`Controller::set_state`], [`Controller::update`]
//!   and [`Controller::get_force_command`];
//! - the executor thread calls [`Controller::set_teleop`] and, during
//!   lifecycle transitions, [`Controller::reset`].
//!
//! Every field is a lock-free cell, so all methods take `&self`. The state
//! cell is written only by the RT thread, and the RT thread makes a bounded
//! number of read attempts on any cell, so a preempted executor cannot
//! stall it.
//! `update` is O(1) and allocation-free.

use core::sync::atomic::{AtomicU64, Ordering};

use pendulum_common::consts::GAIN_COUNT;
use pendulum_common::types::{PendulumState, TeleopSetpoint};
use thiserror::Error;

use crate::seqlock::SeqLockCell;

// ─── Gains ──────────────────────────────────────────────────────────

/// Gain vector of the wrong length.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feedback matrix must have {GAIN_COUNT} entries, got {actual}")]
pub struct GainError {
    /// Number of entries supplied.
    pub actual: usize,
}

/// Fixed state-feedback gains [position, velocity, angle, angular velocity].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainVector([f64; GAIN_COUNT]);

impl GainVector {
    pub const fn new(gains: [f64; GAIN_COUNT]) -> Self {
        Self(gains)
    }

    /// Build from a slice; fails unless it has exactly 4 entries.
    pub fn from_slice(gains: &[f64]) -> Result<Self, GainError> {
        <[f64; GAIN_COUNT]>::try_from(gains)
            .map(Self)
            .map_err(|_| GainError {
                actual: gains.len(),
            })
    }

    #[inline]
    pub const fn as_array(&self) -> &[f64; GAIN_COUNT] {
        &self.0
    }
}

impl TryFrom<&[f64]> for GainVector {
    type Error = GainError;

    fn try_from(gains: &[f64]) -> Result<Self, Self::Error> {
        Self::from_slice(gains)
    }
}

// ─── Controller ─────────────────────────────────────────────────────

/// Read attempts on the RT path before falling back to the cached value.
const RT_READ_ATTEMPTS: u32 = 8;

/// Slot of the reset epoch in the state cell.
const EPOCH_SLOT: usize = 4;

/// Full-state feedback controller for the cart-pole.
#[derive(Debug)]
pub struct Controller {
    gains: GainVector,
    /// Last sensor snapshot plus the reset epoch it was written under.
    /// Written only by the RT thread.
    state: SeqLockCell<5>,
    /// Bumped by `reset`; samples from an older epoch read as zero.
    reset_epoch: AtomicU64,
    /// Operator setpoint. Written only by the executor thread.
    teleop: SeqLockCell<2>,
    /// Last setpoint the RT thread read successfully, as `f64` bits.
    teleop_cache: [AtomicU64; 2],
    /// Last computed force, as `f64` bits.
    force: AtomicU64,
}

impl Controller {
    pub fn new(gains: GainVector) -> Self {
        Self {
            gains,
            state: SeqLockCell::new(),
            reset_epoch: AtomicU64::new(0),
            teleop: SeqLockCell::new(),
            teleop_cache: [const { AtomicU64::new(0) }; 2],
            force: AtomicU64::new(0.0_f64.to_bits()),
        }
    }

    #[inline]
    pub fn gains(&self) -> &GainVector {
        &self.gains
    }

    /// Overwrite the last-known sensor snapshot. RT thread only.
    #[inline]
    pub fn set_state(&self, state: PendulumState) {
        let [x, dx, theta, dtheta] = state.to_array();
        let epoch = self.reset_epoch.load(Ordering::Acquire) as f64;
        self.state.store([x, dx, theta, dtheta, epoch]);
    }

    /// Overwrite the operator setpoint.
    #[inline]
    pub fn set_teleop(&self, cart_position: f64, cart_velocity: f64) {
        self.teleop.store([cart_position, cart_velocity]);
    }

    /// Recompute the force command from the current state and setpoint.
    ///
    /// Bounded: a setpoint write in progress falls back to the last setpoint
    /// read, and an unreadable state keeps the previous force.
    #[inline]
    pub fn update(&self) {
        let Some(state) = self.state.load_bounded(RT_READ_ATTEMPTS) else {
            return;
        };
        let [x, dx, theta, dtheta] = self.current_state(state);
        let [x_ref, dx_ref] = self.rt_teleop();
        let [g0, g1, g2, g3] = self.gains.0;

        let force = -(g0 * (x - x_ref) + g1 * (dx - dx_ref) + g2 * theta + g3 * dtheta);
        self.force.store(force.to_bits(), Ordering::Release);
    }

    /// Last computed force; `0.0` until the first `update`.
    #[inline]
    pub fn get_force_command(&self) -> f64 {
        f64::from_bits(self.force.load(Ordering::Acquire))
    }

    /// Zero the state, the setpoint and the force command.
    ///
    /// The state cell is left to the RT thread: a new epoch makes every
    /// earlier sample read as zero.
    pub fn reset(&self) {
        self.reset_epoch.fetch_add(1, Ordering::AcqRel);
        self.teleop.store([0.0; 2]);
        self.force.store(0.0_f64.to_bits(), Ordering::Release);
    }

    pub fn get_state(&self) -> PendulumState {
        PendulumState::from_array(self.current_state(self.state.load()))
    }

    pub fn get_teleop(&self) -> TeleopSetpoint {
        let [cart_position, cart_velocity] = self.teleop.load();
        TeleopSetpoint::new(cart_position, cart_velocity)
    }

    /// Drop the epoch slot; zeros if the sample predates the last reset.
    #[inline]
    fn current_state(&self, stored: [f64; 5]) -> [f64; 4] {
        let epoch = self.reset_epoch.load(Ordering::Acquire) as f64;
        if stored[EPOCH_SLOT] == epoch {
            [stored[0], stored[1], stored[2], stored[3]]
        } else {
            [0.0; 4]
        }
    }

    /// Setpoint for the RT thread, never waiting on the executor.
    #[inline]
    fn rt_teleop(&self) -> [f64; 2] {
        match self.teleop.load_bounded(RT_READ_ATTEMPTS) {
            Some(values) => {
                for (cached, value) in self.teleop_cache.iter().zip(values) {
                    cached.store(value.to_bits(), Ordering::Relaxed);
                }
                values
            }
            None => self
                .teleop_cache
                .each_ref()
                .map(|cached| f64::from_bits(cached.load(Ordering::Relaxed))),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pendulum_common::consts::DEFAULT_FEEDBACK_MATRIX;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const TOL: f64 = 1e-9;

    fn expected_force(g: [f64; 4], s: PendulumState, p: TeleopSetpoint) -> f64 {
        -(g[0] * (s.cart_position - p.cart_position)
            + g[1] * (s.cart_velocity - p.cart_velocity)
            + g[2] * s.pole_angle
            + g[3] * s.pole_velocity)
    }

    #[test]
    fn gain_vector_requires_four_entries() {
        assert!(GainVector::from_slice(&[1.0, 2.0, 3.0, 4.0]).is_ok());
        assert_eq!(
            GainVector::from_slice(&[1.0, 2.0, 3.0]),
            Err(GainError { actual: 3 })
        );
        assert_eq!(
            GainVector::try_from(&[0.0; 5][..]),
            Err(GainError { actual: 5 })
        );
        assert_eq!(GainVector::from_slice(&[]), Err(GainError { actual: 0 }));
    }

    #[test]
    fn force_is_zero_before_first_update() {
        let c = Controller::new(GainVector::new(DEFAULT_FEEDBACK_MATRIX));
        assert_eq!(c.get_force_command(), 0.0);
        assert_eq!(c.get_state(), PendulumState::default());
        assert_eq!(c.get_teleop(), TeleopSetpoint::default());
    }

    #[test]
    fn update_matches_control_law() {
        let gain_sets = [
            DEFAULT_FEEDBACK_MATRIX,
            [1.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0],
            [-3.5, 12.0, -0.25, 1e3],
        ];
        let states = [
            PendulumState::new(0.0, 0.0, 0.1, 0.0),
            PendulumState::new(1.0, -0.5, -0.2, 0.3),
            PendulumState::new(-10.0, 4.0, 3.0, -7.5),
        ];
        let setpoints = [
            TeleopSetpoint::new(0.0, 0.0),
            TeleopSetpoint::new(0.5, 0.25),
            TeleopSetpoint::new(-2.0, 1.0),
        ];

        for g in gain_sets {
            let c = Controller::new(GainVector::new(g));
            for s in states {
                for p in setpoints {
                    c.set_state(s);
                    c.set_teleop(p.cart_position, p.cart_velocity);
                    c.update();
                    let want = expected_force(g, s, p);
                    assert!(
                        (c.get_force_command() - want).abs() < TOL,
                        "g={g:?} s={s:?} p={p:?}: got {}, want {want}",
                        c.get_force_command()
                    );
                }
            }
        }
    }

    #[test]
    fn nominal_gains_small_angle() {
        let c = Controller::new(GainVector::new(DEFAULT_FEEDBACK_MATRIX));
        c.set_state(PendulumState::new(0.0, 0.0, 0.1, 0.0));
        c.set_teleop(0.0, 0.0);
        c.update();
        assert!((c.get_force_command() - (-35.68637)).abs() < 1e-6);
    }

    #[test]
    fn set_state_overwrites_without_queuing() {
        let c = Controller::new(GainVector::new([0.0, 0.0, 1.0, 0.0]));
        c.set_state(PendulumState::new(0.0, 0.0, 1.0, 0.0));
        c.set_state(PendulumState::new(0.0, 0.0, 2.0, 0.0));
        c.update();
        assert_eq!(c.get_force_command(), -2.0);
    }

    #[test]
    fn force_is_held_until_next_update() {
        let c = Controller::new(GainVector::new([0.0, 0.0, 1.0, 0.0]));
        c.set_state(PendulumState::new(0.0, 0.0, 1.0, 0.0));
        c.update();
        c.set_state(PendulumState::new(0.0, 0.0, 5.0, 0.0));
        assert_eq!(c.get_force_command(), -1.0);
    }

    #[test]
    fn reset_restores_defaults() {
        let c = Controller::new(GainVector::new(DEFAULT_FEEDBACK_MATRIX));
        for k in 0..5 {
            let v = f64::from(k);
            c.set_state(PendulumState::new(v, -v, 0.1 * v, 2.0 * v));
            c.set_teleop(v, v);
            c.update();
        }
        assert_ne!(c.get_force_command(), 0.0);

        c.reset();
        assert_eq!(c.get_state(), PendulumState::default());
        assert_eq!(c.get_teleop(), TeleopSetpoint::default());
        assert_eq!(c.get_force_command(), 0.0);
        assert_eq!(c.gains().as_array(), &DEFAULT_FEEDBACK_MATRIX);
    }

    #[test]
    fn update_returns_while_setpoint_write_is_stalled() {
        let c = Arc::new(Controller::new(GainVector::new([1.0, 0.0, 0.0, 0.0])));
        c.set_teleop(2.0, 0.0);
        c.set_state(PendulumState::new(0.0, 0.0, 0.0, 0.0));
        c.update();
        assert_eq!(c.get_force_command(), 2.0);

        // Executor preempted in the middle of the next setpoint write.
        c.teleop.stall_writer();
        c.set_state(PendulumState::new(1.0, 0.0, 0.0, 0.0));

        let rt = Arc::clone(&c);
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            rt.update();
            let _ = tx.send(rt.get_force_command());
        });
        let force = rx
            .recv_timeout(Duration::from_millis(500))
            .expect("update blocked on a stalled setpoint write");
        // Falls back to the last setpoint read: -(1 - 2).
        assert_eq!(force, 1.0);
    }

    #[test]
    fn reset_does_not_write_the_state_cell() {
        let c = Controller::new(GainVector::new([0.0, 0.0, 1.0, 0.0]));
        c.set_state(PendulumState::new(0.0, 0.0, 0.5, 0.0));
        let version = c.state.version();

        c.reset();
        assert_eq!(c.state.version(), version);
        assert_eq!(c.get_state(), PendulumState::default());
        c.update();
        assert_eq!(c.get_force_command(), 0.0);

        // The next sample after a reset is live again.
        c.set_state(PendulumState::new(0.0, 0.0, 0.25, 0.0));
        c.update();
        assert_eq!(c.get_force_command(), -0.25);
        assert_eq!(c.get_state().pole_angle, 0.25);
    }
}
