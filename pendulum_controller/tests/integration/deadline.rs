//! Integration test: deadline misses are counted only while Active.

use std::time::Duration;

use pendulum_common::lifecycle::LifecycleState;
use pendulum_common::types::PendulumState;
use pendulum_controller::realtime::{Iteration, RealtimeLoop};
use pendulum_controller::transport::{command_channel, state_channel};
use pendulum_controller::wait_set::ShutdownSignal;

use super::{DEMO_GAINS, node_with};

const TIMEOUTS: u64 = 5;

#[test]
fn timeouts_while_active_are_counted() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(1), false);
    node.configure().unwrap();
    node.activate().unwrap();
    assert_eq!(node.lifecycle_state(), LifecycleState::Active);

    let (_source, subscription) = state_channel("pendulum_joint_states");
    let (sink, _commands) = command_channel(1);
    let shutdown = ShutdownSignal::new();
    let mut rt = RealtimeLoop::new(
        &node,
        &subscription,
        node.create_command_publisher(sink),
        &shutdown,
    );

    for _ in 0..TIMEOUTS {
        assert_eq!(rt.spin_once(), Iteration::Timeout { counted: true });
    }
    assert_eq!(node.missed_deadlines(), TIMEOUTS);
}

#[test]
fn timeouts_while_inactive_are_ignored() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(1), false);
    node.configure().unwrap();
    assert_eq!(node.lifecycle_state(), LifecycleState::Inactive);

    let (_source, subscription) = state_channel("pendulum_joint_states");
    let (sink, _commands) = command_channel(1);
    let shutdown = ShutdownSignal::new();
    let mut rt = RealtimeLoop::new(
        &node,
        &subscription,
        node.create_command_publisher(sink),
        &shutdown,
    );

    for _ in 0..TIMEOUTS {
        assert_eq!(rt.spin_once(), Iteration::Timeout { counted: false });
    }
    assert_eq!(node.missed_deadlines(), 0);
    assert_eq!(rt.stats().timeouts, TIMEOUTS);
}

#[test]
fn miss_counter_survives_deactivation() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(1), false);
    node.configure().unwrap();
    node.activate().unwrap();

    let (mut source, subscription) = state_channel("pendulum_joint_states");
    let (sink, _commands) = command_channel(4);
    let shutdown = ShutdownSignal::new();
    let mut rt = RealtimeLoop::new(
        &node,
        &subscription,
        node.create_command_publisher(sink),
        &shutdown,
    );

    rt.spin_once();
    rt.spin_once();
    source.publish(PendulumState::default()).unwrap();
    assert!(matches!(rt.spin_once(), Iteration::Processed { .. }));
    node.deactivate().unwrap();
    rt.spin_once();

    assert_eq!(node.missed_deadlines(), 2);
    let snapshot = node.last_deactivation_snapshot().unwrap();
    assert_eq!(snapshot.missed_deadlines, 2);
}
