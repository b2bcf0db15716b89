//! # minifsm-core
//!
//! Thread-safe, event-driven finite state machine engine.
//!
//! This crate provides:
//! - States with optional enter/exit hooks
//! - A transition table keyed by state identity and event name
//! - A single dispatch worker fed by any number of producer threads
//! - Immediate or graceful shutdown of the worker
//!
//! ```
//! use minifsm_core::{Fsm, State};
//! use std::time::Duration;
//!
//! let idle = State::new("idle").into_ref();
//! let running = State::new("running").into_ref();
//!
//! let fsm = Fsm::new(idle.clone()).unwrap();
//! fsm.add_transition(&idle, "start", &running);
//! fsm.add_transition(&running, "stop", &idle);
//!
//! fsm.trigger("start");
//! assert!(fsm.wait_idle(Duration::from_secs(1)));
//! assert_eq!(fsm.current_state_name(), "running");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod table;

pub use config::{EngineConfig, ShutdownMode};
pub use engine::{EngineStats, Fsm, FsmBuilder, FsmHandle, WorkerState};
pub use error::{CoreError, TriggerError};
pub use state::{Hook, State, StateId, StateRef};
pub use table::TransitionTable;
