//! Integration test: configuration file → validated node.

use std::io::Write;
use std::path::Path;

use pendulum_common::config::{ConfigError, ConfigLoader, ControllerNodeConfig};
use pendulum_common::lifecycle::LifecycleState;
use pendulum_controller::node::{NodeError, PendulumControllerNode};
use tempfile::NamedTempFile;

#[test]
fn shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/controller.toml");
    let config = ControllerNodeConfig::load(&path).unwrap();
    let defaults = ControllerNodeConfig::default();

    assert_eq!(config.deadline_us, defaults.deadline_us);
    assert_eq!(config.controller.feedback_matrix, defaults.controller.feedback_matrix);
    assert_eq!(config.proc_settings, defaults.proc_settings);
    assert_eq!(config.simulation, defaults.simulation);
    assert_eq!(config.state_topic_name, defaults.state_topic_name);
    assert!(config.validate().is_ok());
}

#[test]
fn node_from_file_uses_configured_deadline_and_auto_start() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
deadline_us = 750
auto_start_node = true

[controller]
feedback_matrix = [0.0, 0.0, 2.0, 0.0]
"#
    )
    .unwrap();

    let config = ControllerNodeConfig::load(file.path()).unwrap();
    let node = PendulumControllerNode::new(&config).unwrap();
    assert_eq!(node.deadline().as_micros(), 750);
    assert_eq!(node.controller().gains().as_array(), &[0.0, 0.0, 2.0, 0.0]);
    assert_eq!(node.init().unwrap(), LifecycleState::Active);
}

#[test]
fn short_feedback_matrix_fails_startup() {
    let config = ControllerNodeConfig::from_toml(
        r#"
[controller]
feedback_matrix = [1.0, 2.0, 3.0]
"#,
    )
    .unwrap();

    assert!(matches!(
        PendulumControllerNode::new(&config),
        Err(NodeError::Config(ConfigError::ValidationError(_)))
    ));
}
