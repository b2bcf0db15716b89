//! State definitions and enter/exit hooks.
//!
//! Hooks are installed while the state is still uniquely owned:
//!
//! ```
//! use minifsm_core::State;
//!
//! let running = State::new("running")
//!     .with_on_enter(|fsm| tracing::info!("entered, fsm in {}", fsm.current_state_name()))
//!     .into_ref();
//! assert_eq!(running.name(), "running");
//! ```
//!
//! Once a state is shared as a [`StateRef`] its hooks can no longer change,
//! so the worker never races with hook installation.

use crate::engine::FsmHandle;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared reference to a state, held by callers and the engine alike.
pub type StateRef = Arc<State>;

/// Callback run by the worker on entering or leaving a state.
pub type Hook = Arc<dyn Fn(&FsmHandle) + Send + Sync>;

/// Process-unique identity of a [`State`] instance.
///
/// Two states constructed with the same name still get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(u64);

impl StateId {
    fn next() -> Self {
        Self(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id, unique for the life of the process.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A named node of the automaton.
pub struct State {
    id: StateId,
    name: String,
    on_enter: Option<Hook>,
    on_exit: Option<Hook>,
}

impl State {
    /// Creates a state with a fresh identity and no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StateId::next(),
            name: name.into(),
            on_enter: None,
            on_exit: None,
        }
    }

    /// Installs the hook run after the engine switches into this state.
    pub fn with_on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FsmHandle) + Send + Sync + 'static,
    {
        self.on_enter = Some(Arc::new(hook));
        self
    }

    /// Installs the hook run before the engine switches away from this state.
    pub fn with_on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FsmHandle) + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(hook));
        self
    }

    /// Wraps the state for sharing with the engine.
    pub fn into_ref(self) -> StateRef {
        Arc::new(self)
    }

    /// Identity used by the transition table.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Name for display and logging; not unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an enter hook is installed.
    pub fn has_on_enter(&self) -> bool {
        self.on_enter.is_some()
    }

    /// Whether an exit hook is installed.
    pub fn has_on_exit(&self) -> bool {
        self.on_exit.is_some()
    }

    /// Runs the enter hook, if any.
    pub fn enter(&self, fsm: &FsmHandle) {
        if let Some(hook) = &self.on_enter {
            hook(fsm);
        }
    }

    /// Runs the exit hook, if any.
    pub fn exit(&self, fsm: &FsmHandle) {
        if let Some(hook) = &self.on_exit {
            hook(fsm);
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id.as_u64())
            .field("name", &self.name)
            .field("on_enter", &self.on_enter.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
