//! minifsm - concurrent state machine demo
//!
//! Spawns several producer threads that drive one shared state machine
//! through idle/running/paused and reports the final state and dispatch
//! statistics.

mod config;

use clap::Parser;
use config::{parse_shutdown_mode, Config};
use minifsm_core::{Fsm, FsmHandle, State, StateRef};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long to wait for the worker to drain after producers finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "minifsm")]
#[command(about = "Drive a shared state machine from concurrent producer threads")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "MINIFSM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of producer threads
    #[arg(short, long)]
    producers: Option<usize>,

    /// Iterations per producer
    #[arg(short, long)]
    rounds: Option<usize>,

    /// Pause between triggers in milliseconds
    #[arg(long)]
    step_delay_ms: Option<u64>,

    /// Maximum queued events (0 = unbounded)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Shutdown mode: immediate or graceful
    #[arg(long, value_parser = parse_mode_arg)]
    shutdown_mode: Option<minifsm_core::ShutdownMode>,
}

fn parse_mode_arg(s: &str) -> Result<minifsm_core::ShutdownMode, String> {
    parse_shutdown_mode(s).ok_or_else(|| format!("unknown shutdown mode '{}'", s))
}

impl Cli {
    fn load_config(&self) -> Result<Config, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                let mut c = Config::from_file(path)?;
                c.apply_env_overrides();
                tracing::info!("Loaded config from {}", path.display());
                c
            }
            None => Config::load()?,
        };

        if let Some(n) = self.producers {
            config.demo.producers = n;
        }
        if let Some(n) = self.rounds {
            config.demo.rounds = n;
        }
        if let Some(ms) = self.step_delay_ms {
            config.demo.step_delay_ms = ms;
        }
        if let Some(n) = self.queue_capacity {
            config.engine.queue_capacity = n;
        }
        if let Some(mode) = self.shutdown_mode {
            config.engine.shutdown_mode = mode;
        }

        config.validate()?;
        Ok(config)
    }
}

struct Machine {
    idle: StateRef,
    running: StateRef,
    paused: StateRef,
}

impl Machine {
    fn new() -> Self {
        let announce = |name: &'static str| {
            State::new(name)
                .with_on_enter(move |_: &FsmHandle| tracing::info!("-> {}", name))
                .into_ref()
        };
        Self {
            idle: announce("idle"),
            running: announce("running"),
            paused: announce("paused"),
        }
    }

    fn install(&self, fsm: &Fsm) {
        fsm.add_transition(&self.idle, "start", &self.running);
        fsm.add_transition(&self.running, "pause", &self.paused);
        fsm.add_transition(&self.paused, "resume", &self.running);
        fsm.add_transition(&self.running, "stop", &self.idle);
    }
}

/// One producer's workload: even ids start/stop, odd ids also pause/resume.
fn produce(id: usize, fsm: FsmHandle, rounds: usize, step: Duration) {
    let script: &[&str] = if id % 2 == 0 {
        &["start", "stop"]
    } else {
        &["start", "pause", "resume", "stop"]
    };

    for _ in 0..rounds {
        for event in script {
            fsm.trigger(*event);
            thread::sleep(step);
        }
        thread::sleep(step * 5);
    }
    tracing::debug!(producer = id, "producer finished");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let cli = Cli::parse();
    let config = match cli.load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting minifsm demo");
    tracing::info!("  Producers: {}", config.demo.producers);
    tracing::info!("  Rounds: {}", config.demo.rounds);
    tracing::info!("  Shutdown mode: {:?}", config.engine.shutdown_mode);
    match config.engine.capacity() {
        Some(n) => tracing::info!("  Queue capacity: {}", n),
        None => tracing::info!("  Queue capacity: unbounded"),
    }

    let machine = Machine::new();
    let fsm = Fsm::with_config(machine.idle.clone(), config.engine.clone())?;
    machine.install(&fsm);

    let step = config.demo.step_delay();
    thread::scope(|scope| {
        for id in 0..config.demo.producers {
            let handle = fsm.handle();
            let rounds = config.demo.rounds;
            scope.spawn(move || produce(id, handle, rounds, step));
        }
    });

    if !fsm.wait_idle(DRAIN_TIMEOUT) {
        tracing::warn!(pending = fsm.pending_events(), "worker did not drain in time");
    }

    tracing::info!("Final state: {}", fsm.current_state_name());
    fsm.shutdown();

    println!("{}", serde_json::to_string_pretty(&fsm.stats())?);
    Ok(())
}
