//! In-process plant driver used by `--simulate`.
//!
//! Closes the loop without external collaborators: once per period the
//! latest force command is applied to the plant, the plant is stepped, and a
//! sensor sample is published on the state channel.
//!
//! The plant exposes a position-controlled joint, so a force is applied as a
//! unit-mass acceleration over one period: `position += force·dt²`. The pole
//! angle reported to the controller is measured from upright (`position - π/2`);
//! the cart is not simulated and reads as zero.

use std::f64::consts::FRAC_PI_2;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use pendulum_common::motor::Actuator;
use pendulum_common::types::{ForceCommand, PendulumState};
use tracing::{debug, info, trace};

use crate::transport::{PublishError, StatePublisher};
use crate::wait_set::ShutdownSignal;

/// Periodic driver for any [`Actuator`].
pub struct PlantLoopback<A: Actuator> {
    plant: A,
    commands: Receiver<ForceCommand>,
    states: StatePublisher,
    period: Duration,
    dt: f64,
    last_force: f64,
    steps: u64,
}

impl<A: Actuator> PlantLoopback<A> {
    pub fn new(
        plant: A,
        period: Duration,
        commands: Receiver<ForceCommand>,
        states: StatePublisher,
    ) -> Self {
        Self {
            plant,
            commands,
            states,
            period,
            dt: period.as_secs_f64(),
            last_force: 0.0,
            steps: 0,
        }
    }

    /// Apply pending commands, advance the plant one period and publish the
    /// resulting sample.
    pub fn step(&mut self) -> PendulumState {
        if let Some(command) = self.commands.try_iter().last() {
            self.last_force = command.force;
            let target = self.plant.get_position() + command.force * self.dt * self.dt;
            self.plant.update_motor_command(target);
        }
        self.plant.update_motor_state();
        self.steps += 1;

        let sample = PendulumState::new(
            0.0,
            0.0,
            self.plant.get_position() - FRAC_PI_2,
            self.plant.get_velocity(),
        );
        if let Err(PublishError::Disconnected) = self.states.publish(sample) {
            trace!("State channel '{}' closed", self.states.topic());
        }
        sample
    }

    /// Step at a fixed rate until shutdown. Returns the number of steps.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> u64 {
        info!(
            "Plant loopback running: period={}us, topic='{}'",
            self.period.as_micros(),
            self.states.topic()
        );
        let mut next = Instant::now();
        loop {
            self.step();
            next += self.period;
            let now = Instant::now();
            if next <= now {
                // Behind schedule: re-anchor instead of bursting.
                next = now;
                if shutdown.is_triggered() {
                    break;
                }
            } else if shutdown.wait_timeout(next - now) {
                break;
            }
        }
        debug!(
            "Plant loopback stopped after {} steps ({} samples evicted, last force {:.4})",
            self.steps,
            self.states.dropped(),
            self.last_force
        );
        self.steps
    }

    #[inline]
    pub fn plant(&self) -> &A {
        &self.plant
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::state_channel;
    use crossbeam_channel::bounded;
    use pendulum_common::types::PendulumProperties;
    use pendulum_motor::MotorSim;
    use std::thread;

    fn loopback_at(position: f64) -> (
        PlantLoopback<MotorSim>,
        crossbeam_channel::Sender<ForceCommand>,
        crate::transport::StateSubscription,
    ) {
        let mut plant =
            MotorSim::new(Duration::from_millis(1), PendulumProperties::default()).unwrap();
        plant.update_motor_command(position);
        let (cmd_tx, cmd_rx) = bounded(4);
        let (state_tx, state_rx) = state_channel("states");
        (
            PlantLoopback::new(plant, Duration::from_millis(1), cmd_rx, state_tx),
            cmd_tx,
            state_rx,
        )
    }

    #[test]
    fn upright_plant_reports_zero_angle() {
        let (mut loopback, _cmd, states) = loopback_at(FRAC_PI_2);
        let sample = loopback.step();
        assert_eq!(sample.pole_angle, 0.0);
        assert_eq!(sample.cart_position, 0.0);
        assert_eq!(states.take().unwrap(), sample);
        assert_eq!(loopback.steps(), 1);
    }

    #[test]
    fn latest_command_moves_joint() {
        let (mut loopback, cmd, _states) = loopback_at(FRAC_PI_2);
        cmd.send(ForceCommand { force: 1000.0 }).unwrap();
        cmd.send(ForceCommand { force: -1000.0 }).unwrap();
        let sample = loopback.step();
        // Only the newest command applies: -1000·(1e-3)² moves 1e-3 rad below upright.
        assert!((sample.pole_angle + 1e-3).abs() < 1e-6);
    }

    #[test]
    fn run_stops_on_shutdown() {
        let (mut loopback, _cmd, _states) = loopback_at(FRAC_PI_2);
        let shutdown = ShutdownSignal::new();
        let trigger = shutdown.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });
        let steps = loopback.run(&shutdown);
        stopper.join().unwrap();
        assert!(steps >= 1);
        assert!(loopback.plant().get_position().is_finite());
    }
}
