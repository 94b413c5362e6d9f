//! Deadline-monitored control cycle.
//!
//! Each iteration blocks on the wait set for at most the configured
//! deadline:
//! - sample ready → `set_state → update → get_force_command → publish`,
//!   completed before the next wait;
//! - timeout → counted as a missed deadline only while `Active`;
//! - shutdown → the loop returns after the current iteration.
//!
//! Nothing inside an iteration escalates. Take failures and publish failures
//! are recorded in [`CycleStats`] and the loop moves on to the next wait.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use pendulum_common::lifecycle::LifecycleState;
use pendulum_common::types::{ForceCommand, PendulumState};
use tracing::{debug, info, trace};

use crate::node::PendulumControllerNode;
use crate::transport::{
    CommandSink, LifecyclePublisher, PublishError, PublishOutcome, StateSubscription, TakeError,
};
use crate::wait_set::{ShutdownSignal, WaitResult, WaitSet};

// ─── Deadline Monitor ───────────────────────────────────────────────

/// Monotonic count of deadlines missed while `Active`.
#[derive(Debug, Default)]
pub struct DeadlineMonitor {
    missed: AtomicU64,
}

impl DeadlineMonitor {
    pub const fn new() -> Self {
        Self {
            missed: AtomicU64::new(0),
        }
    }

    /// Record a wait that ended without a sample.
    ///
    /// Returns `true` if the timeout counted as a missed deadline.
    #[inline]
    pub fn on_timeout(&self, state: LifecycleState) -> bool {
        if state == LifecycleState::Active {
            self.missed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-iteration counters, owned by the RT thread.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// Iterations completed.
    pub iterations: u64,
    /// Samples taken and processed.
    pub samples: u64,
    /// Commands delivered to the sink.
    pub published: u64,
    /// Commands dropped because the publisher was not activated.
    pub suppressed: u64,
    /// Commands the sink rejected.
    pub publish_failures: u64,
    /// Waits that ended without a sample (any lifecycle state).
    pub timeouts: u64,
    /// Samples signalled ready but not retrievable.
    pub take_failures: u64,
    /// Last sample processing time [ns].
    pub last_process_ns: u64,
    /// Maximum sample processing time [ns].
    pub max_process_ns: u64,
    /// Running sum for the average.
    pub sum_process_ns: u64,
}

impl CycleStats {
    #[inline]
    fn record_process(&mut self, duration_ns: u64) {
        self.samples += 1;
        self.last_process_ns = duration_ns;
        if duration_ns > self.max_process_ns {
            self.max_process_ns = duration_ns;
        }
        self.sum_process_ns = self.sum_process_ns.saturating_add(duration_ns);
    }

    /// Average sample processing time [ns] (0 if no samples).
    #[inline]
    pub fn avg_process_ns(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.sum_process_ns / self.samples
        }
    }
}

// ─── Loop ───────────────────────────────────────────────────────────

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Iteration {
    /// Sample processed; carries the computed force and publish outcome.
    Processed {
        force: f64,
        outcome: PublishOutcome,
    },
    /// Sample processed but the sink rejected the command.
    PublishFailed { force: f64, error: PublishError },
    /// Ready but nothing retrievable; cycle skipped.
    TakeFailed(TakeError),
    /// No sample within the deadline.
    Timeout {
        /// Whether the miss counter was incremented.
        counted: bool,
    },
    /// Shutdown requested; the loop must stop.
    Shutdown,
}

/// The control loop run on the RT thread.
pub struct RealtimeLoop<'a, S: CommandSink> {
    node: &'a PendulumControllerNode,
    wait_set: WaitSet<'a>,
    shutdown: &'a ShutdownSignal,
    publisher: LifecyclePublisher<S>,
    stats: CycleStats,
}

impl<'a, S: CommandSink> RealtimeLoop<'a, S> {
    pub fn new(
        node: &'a PendulumControllerNode,
        subscription: &'a StateSubscription,
        publisher: LifecyclePublisher<S>,
        shutdown: &'a ShutdownSignal,
    ) -> Self {
        Self {
            node,
            wait_set: WaitSet::new(subscription, shutdown),
            shutdown,
            publisher,
            stats: CycleStats::default(),
        }
    }

    /// Run until shutdown. Never returns an error.
    pub fn run(&mut self) -> &CycleStats {
        info!(
            "Entering RT loop on '{}' (deadline={}us)",
            self.wait_set.subscription().topic(),
            self.node.deadline().as_micros()
        );

        while self.spin_once() != Iteration::Shutdown {}

        info!(
            "RT loop stopped after {} iterations: samples={}, published={}, suppressed={}, \
             publish_failures={}, take_failures={}, missed_deadlines={}, avg={}ns, max={}ns",
            self.stats.iterations,
            self.stats.samples,
            self.stats.published,
            self.stats.suppressed,
            self.stats.publish_failures,
            self.stats.take_failures,
            self.node.missed_deadlines(),
            self.stats.avg_process_ns(),
            self.stats.max_process_ns,
        );
        &self.stats
    }

    /// Run one bounded wait and handle its result.
    pub fn spin_once(&mut self) -> Iteration {
        let deadline = self.node.deadline();
        let iteration = match self.wait_set.wait(deadline) {
            WaitResult::Shutdown => return Iteration::Shutdown,
            WaitResult::Timeout => self.on_timeout(),
            WaitResult::Ready => match self.wait_set.subscription().take() {
                Ok(sample) => self.on_sensor_message(sample),
                Err(TakeError::Disconnected) => {
                    // Source gone: the channel stays ready, so pace the loop
                    // with the deadline and account it as a timeout.
                    if self.shutdown.wait_timeout(deadline) {
                        return Iteration::Shutdown;
                    }
                    self.stats.take_failures += 1;
                    self.on_timeout()
                }
                Err(error) => {
                    self.stats.take_failures += 1;
                    trace!("Take failed: {error}");
                    Iteration::TakeFailed(error)
                }
            },
        };
        self.stats.iterations += 1;
        iteration
    }

    #[inline]
    fn on_timeout(&mut self) -> Iteration {
        self.stats.timeouts += 1;
        let counted = self
            .node
            .deadline_monitor()
            .on_timeout(self.node.lifecycle_state());
        if counted {
            trace!("Missed deadline #{}", self.node.missed_deadlines());
        }
        Iteration::Timeout { counted }
    }

    /// `set_state → update → get_force_command → publish`, synchronously.
    fn on_sensor_message(&mut self, sample: PendulumState) -> Iteration {
        let start = Instant::now();
        let controller = self.node.controller();

        controller.set_state(sample);
        controller.update();
        let force = controller.get_force_command();

        let iteration = match self.publisher.publish(ForceCommand { force }) {
            Ok(outcome) => {
                match outcome {
                    PublishOutcome::Sent => self.stats.published += 1,
                    PublishOutcome::Suppressed => self.stats.suppressed += 1,
                }
                Iteration::Processed { force, outcome }
            }
            Err(error) => {
                self.stats.publish_failures += 1;
                if self.stats.publish_failures <= 10 || self.stats.publish_failures % 1000 == 0 {
                    debug!(
                        "Publish failure #{} on '{}': {error}",
                        self.stats.publish_failures,
                        self.publisher.topic()
                    );
                }
                Iteration::PublishFailed { force, error }
            }
        };

        self.stats
            .record_process(start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64);
        iteration
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
