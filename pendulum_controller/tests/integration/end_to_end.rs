//! Integration test: one sample in, one force command out.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pendulum_common::types::PendulumState;
use pendulum_controller::realtime::{Iteration, RealtimeLoop};
use pendulum_controller::transport::{PublishOutcome, command_channel, state_channel};
use pendulum_controller::wait_set::ShutdownSignal;

use super::{DEMO_GAINS, node_with};

const EXPECTED_FORCE: f64 = -35.68637;

#[test]
fn single_sample_yields_single_command() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(50), false);
    node.configure().unwrap();
    node.activate().unwrap();

    let (mut source, subscription) = state_channel("pendulum_joint_states");
    let (sink, commands) = command_channel(8);
    let shutdown = ShutdownSignal::new();
    let mut rt = RealtimeLoop::new(
        &node,
        &subscription,
        node.create_command_publisher(sink),
        &shutdown,
    );

    source.publish(PendulumState::new(0.0, 0.0, 0.1, 0.0)).unwrap();
    let iteration = rt.spin_once();

    match iteration {
        Iteration::Processed { force, outcome } => {
            assert!((force - EXPECTED_FORCE).abs() < 1e-9);
            assert_eq!(outcome, PublishOutcome::Sent);
        }
        other => panic!("expected a processed sample, got {other:?}"),
    }
    assert_eq!(commands.len(), 1);
    let command = commands.try_recv().unwrap();
    assert!((command.force - EXPECTED_FORCE).abs() < 1e-9);
    assert_eq!(rt.stats().published, 1);
}

#[test]
fn threaded_loop_publishes_once_per_sample() {
    let node = Arc::new(node_with(DEMO_GAINS, Duration::from_millis(5), false));
    node.configure().unwrap();
    node.activate().unwrap();

    let (mut source, subscription) = state_channel("pendulum_joint_states");
    let (sink, commands) = command_channel(8);
    let shutdown = ShutdownSignal::new();

    let rt_node = node.clone();
    let rt_shutdown = shutdown.clone();
    let rt_thread = thread::spawn(move || {
        let publisher = rt_node.create_command_publisher(sink);
        RealtimeLoop::new(&rt_node, &subscription, publisher, &rt_shutdown)
            .run()
            .clone()
    });

    source.publish(PendulumState::new(0.0, 0.0, 0.1, 0.0)).unwrap();
    let command = commands.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!((command.force - EXPECTED_FORCE).abs() < 1e-9);

    // No further sample, no further command.
    assert!(commands.recv_timeout(Duration::from_millis(30)).is_err());

    shutdown.trigger();
    let stats = rt_thread.join().unwrap();
    assert_eq!(stats.samples, 1);
    assert_eq!(stats.published, 1);
}

#[test]
fn teleop_setpoint_shifts_force() {
    let node = node_with([1.0, 2.0, 0.0, 0.0], Duration::from_millis(50), false);
    node.configure().unwrap();
    node.activate().unwrap();
    node.set_teleop(pendulum_common::types::TeleopSetpoint::new(1.0, 0.5));

    let (mut source, subscription) = state_channel("pendulum_joint_states");
    let (sink, commands) = command_channel(1);
    let shutdown = ShutdownSignal::new();
    let mut rt = RealtimeLoop::new(
        &node,
        &subscription,
        node.create_command_publisher(sink),
        &shutdown,
    );

    source.publish(PendulumState::new(0.0, 0.0, 0.0, 0.0)).unwrap();
    rt.spin_once();

    // -(1·(0 - 1) + 2·(0 - 0.5)) = 2
    assert_eq!(commands.try_recv().unwrap().force, 2.0);
}
