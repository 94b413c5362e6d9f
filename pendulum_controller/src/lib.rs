//! # Pendulum Controller Library
//!
//! Deadline-monitored state-feedback controller for the cart-pole
//! stabilization demo.
//!
//! ## Threads
//!
//! - **R** (real-time): [`realtime::RealtimeLoop`] waits on the state channel,
//!   runs the control law and publishes one force command per sample.
//! - **E** (executor): [`executor::Executor`] applies teleoperation setpoints
//!   and lifecycle transitions.
//!
//! Both share one [`node::PendulumControllerNode`] through `Arc`. Nothing on
//! the R path blocks except the bounded wait, and nothing allocates.

pub mod controller;
pub mod executor;
pub mod lifecycle;
pub mod loopback;
pub mod node;
pub mod realtime;
pub mod rt;
pub mod seqlock;
pub mod transport;
pub mod wait_set;
