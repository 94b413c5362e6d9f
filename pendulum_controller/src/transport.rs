//! In-process channels between the sensor source, the RT loop and the
//! command consumer.
//!
//! - State samples: capacity-1 channel, newest sample wins. The publisher
//!   drops a stale pending sample before sending a new one.
//! - Force commands: [`CommandSink`] trait with a channel implementation,
//!   wrapped by [`LifecyclePublisher`] so emission follows activation.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use pendulum_common::types::{ForceCommand, PendulumState};
use thiserror::Error;
use tracing::{debug, warn};

// ─── Errors ─────────────────────────────────────────────────────────

/// A sample was signalled ready but could not be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TakeError {
    /// The pending sample was consumed or replaced before `take`.
    #[error("no sample pending")]
    Empty,
    /// Every publisher is gone.
    #[error("state source disconnected")]
    Disconnected,
}

/// Outbound command could not be delivered. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Consumer has not drained the previous command.
    #[error("command queue full")]
    Full,
    /// Consumer is gone.
    #[error("command consumer disconnected")]
    Disconnected,
}

// ─── State Samples ──────────────────────────────────────────────────

/// Create a capacity-1, newest-wins state sample channel.
pub fn state_channel(topic: &str) -> (StatePublisher, StateSubscription) {
    let (tx, rx) = bounded(1);
    let publisher = StatePublisher {
        tx,
        drain: rx.clone(),
        topic: topic.to_string(),
        dropped: 0,
    };
    let subscription = StateSubscription {
        rx,
        topic: topic.to_string(),
    };
    (publisher, subscription)
}

/// Producer side of the state channel.
pub struct StatePublisher {
    tx: Sender<PendulumState>,
    /// Used only to evict a stale pending sample.
    drain: Receiver<PendulumState>,
    topic: String,
    dropped: u64,
}

impl StatePublisher {
    /// Publish a sample, replacing any sample still pending.
    ///
    /// # Errors
    /// `PublishError::Disconnected` if the channel is closed. The publisher
    /// keeps its own drain handle, so a dropped subscription alone does not
    /// close it.
    pub fn publish(&mut self, sample: PendulumState) -> Result<(), PublishError> {
        let mut sample = sample;
        loop {
            match self.tx.try_send(sample) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    if self.drain.try_recv().is_ok() {
                        self.dropped += 1;
                    }
                    sample = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return Err(PublishError::Disconnected),
            }
        }
    }

    /// Samples evicted before the subscriber took them.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Consumer side of the state channel, owned by the RT thread.
pub struct StateSubscription {
    rx: Receiver<PendulumState>,
    topic: String,
}

impl StateSubscription {
    /// Take the pending sample without blocking.
    ///
    /// # Errors
    /// `TakeError::Empty` if nothing is pending, `TakeError::Disconnected` if
    /// every publisher is gone.
    #[inline]
    pub fn take(&self) -> Result<PendulumState, TakeError> {
        self.rx.try_recv().map_err(|e| match e {
            TryRecvError::Empty => TakeError::Empty,
            TryRecvError::Disconnected => TakeError::Disconnected,
        })
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn receiver(&self) -> &Receiver<PendulumState> {
        &self.rx
    }
}

// ─── Force Commands ─────────────────────────────────────────────────

/// Fire-and-forget destination for force commands.
pub trait CommandSink: Send {
    /// Deliver one command. Must not block.
    fn publish(&mut self, command: ForceCommand) -> Result<(), PublishError>;
}

/// Create a command channel with the given queue depth.
pub fn command_channel(depth: usize) -> (ChannelCommandSink, Receiver<ForceCommand>) {
    let (tx, rx) = bounded(depth.max(1));
    (ChannelCommandSink { tx }, rx)
}

/// [`CommandSink`] over a bounded crossbeam channel.
pub struct ChannelCommandSink {
    tx: Sender<ForceCommand>,
}

impl CommandSink for ChannelCommandSink {
    fn publish(&mut self, command: ForceCommand) -> Result<(), PublishError> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => PublishError::Full,
            TrySendError::Disconnected(_) => PublishError::Disconnected,
        })
    }
}

/// Shared activation switch for a [`LifecyclePublisher`].
#[derive(Debug, Clone, Default)]
pub struct PublisherGate {
    activated: Arc<AtomicBool>,
}

impl PublisherGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self) {
        self.activated.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.activated.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::Acquire)
    }
}

/// What happened to a command handed to a [`LifecyclePublisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered to the sink.
    Sent,
    /// Dropped because the publisher is not activated.
    Suppressed,
}

/// Command publisher whose output is enabled only between activate and
/// deactivate.
pub struct LifecyclePublisher<S: CommandSink> {
    sink: S,
    gate: PublisherGate,
    topic: String,
    /// Whether the "inactive publisher" warning was already emitted.
    warned_inactive: bool,
}

impl<S: CommandSink> LifecyclePublisher<S> {
    pub fn new(sink: S, gate: PublisherGate, topic: &str) -> Self {
        debug!("Command publisher created on '{topic}'");
        Self {
            sink,
            gate,
            topic: topic.to_string(),
            warned_inactive: false,
        }
    }

    /// Publish if activated; otherwise drop the command.
    ///
    /// # Errors
    /// Propagates the sink's `PublishError`; the caller must not retry.
    pub fn publish(&mut self, command: ForceCommand) -> Result<PublishOutcome, PublishError> {
        if !self.gate.is_activated() {
            if !self.warned_inactive {
                warn!(
                    "Trying to publish on '{}' while the publisher is not activated",
                    self.topic
                );
                self.warned_inactive = true;
            }
            return Ok(PublishOutcome::Suppressed);
        }
        self.warned_inactive = false;
        self.sink.publish(command)?;
        Ok(PublishOutcome::Sent)
    }

    #[inline]
    pub fn is_activated(&self) -> bool {
        self.gate.is_activated()
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}
