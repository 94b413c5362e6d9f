mod closed_loop;
mod config;
mod deadline;
mod end_to_end;
mod lifecycle;

use std::time::Duration;

use pendulum_controller::controller::GainVector;
use pendulum_controller::node::{NodeSettings, PendulumControllerNode};

/// Gains of the demo's nominal configuration.
pub const DEMO_GAINS: [f64; 4] = [-10.0, -51.5393, 356.8637, 154.4146];

pub fn node_with(gains: [f64; 4], deadline: Duration, auto_start_node: bool) -> PendulumControllerNode {
    PendulumControllerNode::with_settings(
        NodeSettings {
            state_topic_name: "pendulum_joint_states".into(),
            command_topic_name: "joint_command".into(),
            teleop_topic_name: "teleop".into(),
            deadline,
            auto_start_node,
        },
        GainVector::new(gains),
    )
}
