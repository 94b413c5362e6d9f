//! # Pendulum Controller
//!
//! Runs the cart-pole controller node: an executor thread for teleoperation
//! and lifecycle requests, and a real-time thread for the control loop.
//! With `--simulate` an in-process plant closes the loop.
//!
//! Startup order: config → node → signal handler → executor → RT thread →
//! memory lock → plant loopback → auto-start → run for `--duration-secs` or
//! until interrupted → shutdown → join.

use clap::Parser;
use crossbeam_channel::Receiver;
use pendulum_common::config::{ConfigLoader, ControllerNodeConfig, LogLevel, ProcessSettings};
use pendulum_common::motor::Actuator;
use pendulum_common::types::ForceCommand;
use pendulum_controller::executor::Executor;
use pendulum_controller::loopback::PlantLoopback;
use pendulum_controller::node::PendulumControllerNode;
use pendulum_controller::realtime::{CycleStats, RealtimeLoop};
use pendulum_controller::rt::{self, RtError};
use pendulum_controller::transport::{StatePublisher, command_channel, state_channel};
use pendulum_controller::wait_set::ShutdownSignal;
use pendulum_motor::MotorSim;
use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initial tilt of the simulated pole from upright [rad].
const INITIAL_TILT: f64 = 0.05;

/// Pendulum Controller: deadline-monitored cart-pole stabilization
#[derive(Parser, Debug)]
#[command(name = "pendulum_controller")]
#[command(version)]
#[command(about = "Deadline-monitored state-feedback controller for the cart-pole demo")]
struct Args {
    /// Path to the controller configuration TOML. Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Configure and activate the node at startup.
    #[arg(long)]
    auto_start: bool,

    /// Close the loop with the in-process plant simulator.
    #[arg(long)]
    simulate: bool,

    /// Experiment duration in seconds.
    #[arg(long, default_value_t = 3600)]
    duration_secs: u64,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, config.log_level);

    info!("Pendulum Controller v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Pendulum Controller shutdown complete");
}

fn load_config(args: &Args) -> Result<ControllerNodeConfig, Box<dyn std::error::Error>> {
    let mut config = match args.config {
        Some(ref path) => ControllerNodeConfig::load(path)
            .map_err(|e| format!("{}: {e}", path.display()))?,
        None => ControllerNodeConfig::default(),
    };
    config.auto_start_node |= args.auto_start;
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: ControllerNodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let proc_settings = config.proc_settings;
    let node = Arc::new(PendulumControllerNode::new(&config)?);

    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        signal.trigger();
    })?;

    // Threads spawned from here inherit priority and affinity.
    if proc_settings.configure_child_threads {
        rt::apply_thread_settings(&proc_settings)?;
    }

    // Built before any thread starts so a bad plant aborts cleanly.
    let plant = if args.simulate {
        let mut sim = MotorSim::new(config.simulation.period(), config.simulation.properties())?;
        sim.update_motor_command(FRAC_PI_2 + INITIAL_TILT);
        Some(sim)
    } else {
        None
    };

    let (executor, handle) = Executor::new(node.clone(), shutdown.clone());
    let executor_thread = thread::Builder::new()
        .name("executor".into())
        .spawn(move || executor.spin())?;

    let (state_source, state_subscription) = state_channel(&config.state_topic_name);
    let (command_sink, commands) = command_channel(1);

    let rt_node = node.clone();
    let rt_shutdown = shutdown.clone();
    let rt_thread = thread::Builder::new()
        .name("rt_loop".into())
        .spawn(move || -> Result<CycleStats, RtError> {
            if !proc_settings.configure_child_threads {
                if let Err(e) = rt::apply_thread_settings(&proc_settings) {
                    rt_shutdown.trigger();
                    return Err(e);
                }
            }
            if proc_settings.lock_memory {
                rt::prefault_stack();
            }
            let publisher = rt_node.create_command_publisher(command_sink);
            let mut rt_loop =
                RealtimeLoop::new(&rt_node, &state_subscription, publisher, &rt_shutdown);
            Ok(rt_loop.run().clone())
        })?;

    let workers = Workers {
        rt: rt_thread,
        executor: executor_thread,
        plant: None,
    };
    let workers = match start_plant(
        plant,
        &config,
        &proc_settings,
        commands,
        state_source,
        &shutdown,
    ) {
        Ok(plant_thread) => Workers {
            plant: Some(plant_thread),
            ..workers
        },
        Err(e) => {
            workers.abort(&shutdown);
            return Err(e);
        }
    };

    if let Err(e) = handle.request_init() {
        workers.abort(&shutdown);
        return Err(e.into());
    }

    if shutdown.wait_timeout(Duration::from_secs(args.duration_secs)) {
        info!("Shutdown requested");
    } else {
        info!("Experiment duration of {}s elapsed", args.duration_secs);
        shutdown.trigger();
    }

    let Workers {
        rt: rt_thread,
        executor: executor_thread,
        plant: plant_thread,
    } = workers;
    let rt_result = rt_thread.join().map_err(|_| "RT thread panicked")?;
    let final_state = executor_thread
        .join()
        .map_err(|_| "executor thread panicked")??;
    if let Some(plant_thread) = plant_thread {
        let steps = plant_thread.join().map_err(|_| "plant thread panicked")?;
        if args.simulate {
            info!("Plant loopback ran {steps} steps");
        }
    }

    let stats = rt_result?;
    info!(
        "Node {final_state}: samples={}, published={}, suppressed={}, timeouts={}, missed_deadlines={}, \
         avg={}ns, max={}ns",
        stats.samples,
        stats.published,
        stats.suppressed,
        stats.timeouts,
        node.missed_deadlines(),
        stats.avg_process_ns(),
        stats.max_process_ns,
    );

    Ok(())
}

/// Threads spawned by `run`.
struct Workers<R, E> {
    rt: JoinHandle<R>,
    executor: JoinHandle<E>,
    plant: Option<JoinHandle<u64>>,
}

impl<R, E> Workers<R, E> {
    /// Stop and join every worker after a startup failure.
    fn abort(self, shutdown: &ShutdownSignal) {
        shutdown.trigger();
        if self.rt.join().is_err() {
            warn!("RT thread panicked during abort");
        }
        if self.executor.join().is_err() {
            warn!("executor thread panicked during abort");
        }
        if let Some(plant) = self.plant {
            if plant.join().is_err() {
                warn!("plant thread panicked during abort");
            }
        }
    }
}

/// Lock memory, then start the plant loopback if one was built.
///
/// Without a plant the state source is parked on its own thread so the
/// subscription stays connected and the loop keeps reporting timeouts.
fn start_plant(
    plant: Option<MotorSim>,
    config: &ControllerNodeConfig,
    proc_settings: &ProcessSettings,
    commands: Receiver<ForceCommand>,
    state_source: StatePublisher,
    shutdown: &ShutdownSignal,
) -> Result<JoinHandle<u64>, Box<dyn std::error::Error>> {
    rt::apply_memory_settings(proc_settings)?;

    let Some(plant) = plant else {
        warn!(
            "No plant attached; waiting for samples on '{}'",
            config.state_topic_name
        );
        let shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name("state_source".into())
            .spawn(move || {
                let _source = state_source;
                let _commands = commands;
                while !shutdown.wait_timeout(Duration::from_secs(1)) {}
                0
            })?;
        return Ok(handle);
    };

    let shutdown = shutdown.clone();
    let period = config.simulation.period();
    let handle = thread::Builder::new()
        .name("plant_loopback".into())
        .spawn(move || PlantLoopback::new(plant, period, commands, state_source).run(&shutdown))?;
    Ok(handle)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
