//! Bounded wait on the state subscription and the shutdown signal.
//!
//! The RT thread's only suspension point. [`WaitSet::wait`] returns as soon
//! as a sample is pending or shutdown is requested, and never later than the
//! given timeout.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender, bounded};
use pendulum_common::types::PendulumState;

use crate::transport::StateSubscription;

// ─── Shutdown Signal ────────────────────────────────────────────────

/// Process-wide shutdown request.
///
/// Cloneable; `trigger` from any thread (including a signal handler) sets
/// the flag and wakes every [`WaitSet`] built from it.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // Slot already full means a wake-up is already pending.
        let _ = self.wake_tx.try_send(());
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Block until shutdown is requested or `timeout` elapses.
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        if self.wake_rx.recv_timeout(timeout).is_ok() {
            // Leave the wake-up pending for other waiters.
            let _ = self.wake_tx.try_send(());
        }
        self.is_triggered()
    }

    pub(crate) fn wake_receiver(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Wait Set ───────────────────────────────────────────────────────

/// Result of one bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A state sample is pending.
    Ready,
    /// Nothing arrived within the timeout.
    Timeout,
    /// Shutdown was requested.
    Shutdown,
}

/// Wait set registered against exactly one state subscription plus the
/// shutdown signal.
pub struct WaitSet<'a> {
    select: Select<'a>,
    sample_index: usize,
    shutdown: &'a ShutdownSignal,
    subscription: &'a StateSubscription,
}

impl<'a> WaitSet<'a> {
    pub fn new(subscription: &'a StateSubscription, shutdown: &'a ShutdownSignal) -> Self {
        let mut select = Select::new();
        let sample_index = select.recv::<PendulumState>(subscription.receiver());
        select.recv(shutdown.wake_receiver());
        Self {
            select,
            sample_index,
            shutdown,
            subscription,
        }
    }

    /// Block until a sample is pending, shutdown is requested, or `timeout`
    /// elapses. Does not consume the sample.
    pub fn wait(&mut self, timeout: Duration) -> WaitResult {
        if self.shutdown.is_triggered() {
            return WaitResult::Shutdown;
        }
        match self.select.ready_timeout(timeout) {
            Ok(index) if index == self.sample_index => WaitResult::Ready,
            Ok(_) => WaitResult::Shutdown,
            Err(_) if self.shutdown.is_triggered() => WaitResult::Shutdown,
            Err(_) => WaitResult::Timeout,
        }
    }

    #[inline]
    pub fn subscription(&self) -> &'a StateSubscription {
        self.subscription
    }
}
