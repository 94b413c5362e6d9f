//! Integration test: lifecycle sequences through the node.

use std::time::Duration;

use pendulum_common::lifecycle::{LifecycleState, Transition};
use pendulum_common::types::{PendulumState, TeleopSetpoint};
use pendulum_controller::lifecycle::TransitionError;

use super::{DEMO_GAINS, node_with};

#[test]
fn full_cycle_returns_to_unconfigured_with_reset_controller() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(2), false);
    node.controller().set_state(PendulumState::new(1.0, 2.0, 0.3, 0.4));
    node.set_teleop(TeleopSetpoint::new(0.5, 0.1));
    node.controller().update();

    assert_eq!(node.configure().unwrap(), LifecycleState::Inactive);
    assert_eq!(node.activate().unwrap(), LifecycleState::Active);
    assert_eq!(node.deactivate().unwrap(), LifecycleState::Inactive);
    assert_eq!(node.cleanup().unwrap(), LifecycleState::Unconfigured);

    assert_eq!(node.lifecycle_state(), LifecycleState::Unconfigured);
    assert_eq!(node.controller().get_state(), PendulumState::default());
    assert_eq!(node.controller().get_teleop(), TeleopSetpoint::default());
    assert_eq!(node.controller().get_force_command(), 0.0);
}

#[test]
fn activate_from_unconfigured_is_rejected() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(2), false);

    let err = node.activate().unwrap_err();
    assert!(matches!(
        err,
        TransitionError::InvalidTransition {
            transition: Transition::Activate,
            state: LifecycleState::Unconfigured,
        }
    ));
    assert_eq!(node.lifecycle_state(), LifecycleState::Unconfigured);
}

#[test]
fn shutdown_reachable_from_every_primary_state() {
    for steps in 0..3 {
        let node = node_with(DEMO_GAINS, Duration::from_millis(2), false);
        if steps >= 1 {
            node.configure().unwrap();
        }
        if steps >= 2 {
            node.activate().unwrap();
        }
        assert_eq!(node.shutdown().unwrap(), LifecycleState::Finalized);
        assert!(node.configure().is_err());
        assert_eq!(node.lifecycle_state(), LifecycleState::Finalized);
    }
}

#[test]
fn auto_start_reaches_active() {
    let node = node_with(DEMO_GAINS, Duration::from_millis(2), true);
    assert_eq!(node.init().unwrap(), LifecycleState::Active);
    assert_eq!(node.finalize().unwrap(), LifecycleState::Finalized);
    assert!(node.last_deactivation_snapshot().is_some());
}
