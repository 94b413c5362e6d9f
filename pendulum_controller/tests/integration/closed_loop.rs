//! Integration test: controller, executor and simulated plant on their own
//! threads, wired the way the binary wires them.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pendulum_common::lifecycle::LifecycleState;
use pendulum_common::motor::Actuator;
use pendulum_common::types::PendulumProperties;
use pendulum_controller::executor::Executor;
use pendulum_controller::loopback::PlantLoopback;
use pendulum_controller::realtime::RealtimeLoop;
use pendulum_controller::transport::{command_channel, state_channel};
use pendulum_controller::wait_set::ShutdownSignal;
use pendulum_motor::MotorSim;

use super::{DEMO_GAINS, node_with};

#[test]
fn simulated_plant_drives_the_loop() {
    let node = Arc::new(node_with(DEMO_GAINS, Duration::from_millis(20), true));
    let shutdown = ShutdownSignal::new();

    let (executor, handle) = Executor::new(node.clone(), shutdown.clone());
    let executor_thread = thread::spawn(move || executor.spin());

    let (source, subscription) = state_channel("pendulum_joint_states");
    let (sink, commands) = command_channel(1);

    let rt_node = node.clone();
    let rt_shutdown = shutdown.clone();
    let rt_thread = thread::spawn(move || {
        let publisher = rt_node.create_command_publisher(sink);
        RealtimeLoop::new(&rt_node, &subscription, publisher, &rt_shutdown)
            .run()
            .clone()
    });

    let mut plant = MotorSim::new(Duration::from_millis(1), PendulumProperties::default()).unwrap();
    plant.update_motor_command(FRAC_PI_2 + 0.01);
    let plant_shutdown = shutdown.clone();
    let plant_thread = thread::spawn(move || {
        let mut loopback = PlantLoopback::new(plant, Duration::from_millis(1), commands, source);
        let steps = loopback.run(&plant_shutdown);
        (steps, loopback.plant().get_position())
    });

    handle.request_init().unwrap();
    handle.send_teleop(0.0, 0.0).unwrap();
    while node.lifecycle_state() != LifecycleState::Active {
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(100));
    shutdown.trigger();

    let stats = rt_thread.join().unwrap();
    let final_state = executor_thread.join().unwrap().unwrap();
    let (steps, position) = plant_thread.join().unwrap();

    assert_eq!(final_state, LifecycleState::Finalized);
    assert!(steps > 0);
    assert!(stats.samples > 0);
    assert!(stats.published > 0);
    assert!(position.is_finite());
    assert!((0.0..=std::f64::consts::PI).contains(&position));
}
