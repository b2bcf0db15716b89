//! State machine engine - event queue, dispatch worker and lifecycle.
//!
//! Any number of producer threads call [`FsmHandle::trigger`], which appends
//! the event to a queue and returns immediately. One worker thread owned by
//! the [`Fsm`] pops events in FIFO order, looks up `(current state, event)`
//! in the transition table and, when an edge exists, runs the outgoing
//! state's exit hook, switches the current state and runs the incoming
//! state's enter hook.
//!
//! The queue, the stop flag and the current state share one mutex. The
//! transition table sits behind its own read/write lock; the worker holds the
//! read lock only for the lookup, so transitions may be added while events
//! are flowing. Hooks always run with no engine lock held and may call back
//! into the handle they receive.

use crate::config::{EngineConfig, ShutdownMode};
use crate::error::{CoreError, TriggerError};
use crate::state::StateRef;
use crate::table::TransitionTable;
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Lifecycle of the dispatch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Waiting for or dispatching events.
    Running,
    /// Stop requested; finishing the in-flight dispatch (or the queue, in
    /// graceful mode).
    Draining,
    /// Worker has exited.
    Stopped,
}

/// Dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Events accepted into the queue.
    pub events_enqueued: u64,
    /// Events refused by `trigger` (shutting down or queue full).
    pub events_refused: u64,
    /// Queued events discarded by an immediate shutdown.
    pub events_dropped: u64,
    /// Transitions taken.
    pub transitions: u64,
    /// Events with no edge from the state they were dispatched in.
    pub unknown_transitions: u64,
    /// Enter/exit hooks that panicked.
    pub hook_panics: u64,
}

/// State guarded by the engine mutex.
struct Inner {
    current: StateRef,
    queue: VecDeque<String>,
    stop: bool,
    /// The worker has popped an event and not yet finished dispatching it.
    in_flight: bool,
    worker: WorkerState,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signalled when an event is queued or stop is requested.
    work: Condvar,
    /// Signalled when the worker finishes a dispatch, switches state or exits.
    progress: Condvar,
    table: RwLock<TransitionTable>,
    config: EngineConfig,
    worker_thread: OnceLock<ThreadId>,
    stats_enqueued: AtomicU64,
    stats_refused: AtomicU64,
    stats_dropped: AtomicU64,
    stats_transitions: AtomicU64,
    stats_unknown: AtomicU64,
    stats_hook_panics: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum HookKind {
    Enter,
    Exit,
}

impl HookKind {
    fn as_str(self) -> &'static str {
        match self {
            HookKind::Enter => "on_enter",
            HookKind::Exit => "on_exit",
        }
    }
}

/// Cloneable producer-side handle to a running engine.
///
/// Handles stay usable after the owning [`Fsm`] is gone: queries keep
/// returning the last state and triggers are refused.
#[derive(Clone)]
pub struct FsmHandle {
    shared: Arc<Shared>,
}

impl FsmHandle {
    /// Queues an event for the worker. Never blocks on dispatch.
    ///
    /// The event is silently dropped once shutdown has begun or when a
    /// bounded queue is full; use [`try_trigger`](Self::try_trigger) to
    /// observe that.
    pub fn trigger(&self, event: impl Into<String>) {
        let _ = self.try_trigger(event);
    }

    /// Queues an event, reporting why it was refused.
    pub fn try_trigger(&self, event: impl Into<String>) -> Result<(), TriggerError> {
        let event = event.into();
        {
            let mut inner = self.shared.inner.lock();
            let refused = if inner.stop {
                Some(TriggerError::ShuttingDown)
            } else {
                match self.shared.config.capacity() {
                    Some(capacity) if inner.queue.len() >= capacity => {
                        Some(TriggerError::QueueFull { capacity })
                    }
                    _ => None,
                }
            };

            if let Some(err) = refused {
                drop(inner);
                self.shared.stats_refused.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(event = %event, error = %err, "event refused");
                return Err(err);
            }

            inner.queue.push_back(event);
        }

        self.shared.stats_enqueued.fetch_add(1, Ordering::Relaxed);
        self.shared.work.notify_one();
        Ok(())
    }

    /// Returns the name of the state the worker last settled into.
    pub fn current_state_name(&self) -> String {
        self.shared.inner.lock().current.name().to_string()
    }

    /// Returns the state the worker last settled into.
    pub fn current_state(&self) -> StateRef {
        self.shared.inner.lock().current.clone()
    }

    /// Registers `from --event--> to`, replacing any earlier target for the
    /// same source and event.
    ///
    /// Any string is a valid event, including the empty one.
    pub fn add_transition(&self, from: &StateRef, event: impl Into<String>, to: &StateRef) {
        let event = event.into();
        let displaced = self.shared.table.write().insert(from, event.as_str(), to);
        if let Some(old) = displaced {
            tracing::debug!(
                from = from.name(),
                event = %event,
                old = old.name(),
                new = to.name(),
                "transition overwritten"
            );
        }
    }

    /// Returns every registered edge as (from, event, to) names.
    pub fn transitions(&self) -> Vec<(String, String, String)> {
        self.shared
            .table
            .read()
            .edges()
            .into_iter()
            .map(|(from, event, to)| (from.to_string(), event.to_string(), to.to_string()))
            .collect()
    }

    /// Returns the events that have an edge out of the current state.
    pub fn available_events(&self) -> Vec<String> {
        let current = self.current_state();
        self.shared
            .table
            .read()
            .events_from(&current)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns the number of queued, not yet dispatched, events.
    pub fn pending_events(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    /// Returns the worker's lifecycle state.
    pub fn worker_state(&self) -> WorkerState {
        self.shared.inner.lock().worker
    }

    /// Returns the configuration the engine was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Returns dispatch statistics.
    pub fn stats(&self) -> EngineStats {
        let shared = &self.shared;
        EngineStats {
            events_enqueued: shared.stats_enqueued.load(Ordering::Relaxed),
            events_refused: shared.stats_refused.load(Ordering::Relaxed),
            events_dropped: shared.stats_dropped.load(Ordering::Relaxed),
            transitions: shared.stats_transitions.load(Ordering::Relaxed),
            unknown_transitions: shared.stats_unknown.load(Ordering::Relaxed),
            hook_panics: shared.stats_hook_panics.load(Ordering::Relaxed),
        }
    }

    /// Blocks until every queued event has been dispatched or the worker has
    /// stopped.
    ///
    /// Returns `false` on timeout, and immediately when called from a hook
    /// (the worker cannot wait for itself).
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        if self.is_worker_thread() {
            tracing::warn!("wait_idle called from a hook; not waiting on the worker");
            return false;
        }
        self.wait_on_progress(timeout, |inner| {
            inner.worker == WorkerState::Stopped || (inner.queue.is_empty() && !inner.in_flight)
        })
    }

    /// Blocks until the current state is named `name`.
    ///
    /// Returns `false` on timeout or if the worker stops first. From a hook
    /// this only checks the current state.
    pub fn wait_for_state(&self, name: &str, timeout: Duration) -> bool {
        if self.is_worker_thread() {
            return self.current_state_name() == name;
        }
        let reached = self.wait_on_progress(timeout, |inner| {
            inner.current.name() == name || inner.worker == WorkerState::Stopped
        });
        reached && self.current_state_name() == name
    }

    fn wait_on_progress<F>(&self, timeout: Duration, done: F) -> bool
    where
        F: Fn(&Inner) -> bool,
    {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.shared.inner.lock();
        while !done(&*inner) {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .progress
                        .wait_until(&mut inner, deadline)
                        .timed_out()
                    {
                        return done(&*inner);
                    }
                }
                None => self.shared.progress.wait(&mut inner),
            }
        }
        true
    }

    fn is_worker_thread(&self) -> bool {
        self.shared.worker_thread.get() == Some(&thread::current().id())
    }

    /// Sets the stop flag and wakes the worker.
    fn request_stop(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if !inner.stop {
                inner.stop = true;
                if inner.worker == WorkerState::Running {
                    inner.worker = WorkerState::Draining;
                }
                tracing::debug!(pending = inner.queue.len(), "shutdown requested");
            }
        }
        self.shared.work.notify_all();
    }

    // =========================================================================
    // Worker
    // =========================================================================

    /// Worker thread body.
    fn run_worker(&self) {
        let shared = &self.shared;
        let _ = shared.worker_thread.set(thread::current().id());
        tracing::info!(
            worker = %shared.config.worker_name,
            state = %self.current_state_name(),
            "FSM worker started"
        );

        while let Some((event, current)) = self.next_event() {
            self.dispatch(&event, current);

            shared.inner.lock().in_flight = false;
            shared.progress.notify_all();
        }

        {
            let mut inner = shared.inner.lock();
            inner.in_flight = false;
            inner.worker = WorkerState::Stopped;
        }
        shared.progress.notify_all();
        tracing::info!(worker = %shared.config.worker_name, "FSM worker stopped");
    }

    /// Waits for the next event to dispatch, or `None` once the worker
    /// should exit.
    fn next_event(&self) -> Option<(String, StateRef)> {
        let shared = &self.shared;
        let mut inner = shared.inner.lock();
        while !inner.stop && inner.queue.is_empty() {
            shared.work.wait(&mut inner);
        }

        if inner.stop && shared.config.shutdown_mode == ShutdownMode::Immediate {
            self.discard_queue(&mut inner);
            return None;
        }

        // Graceful stop keeps popping until the queue is empty.
        let event = inner.queue.pop_front()?;
        inner.in_flight = true;
        Some((event, inner.current.clone()))
    }

    fn discard_queue(&self, inner: &mut MutexGuard<'_, Inner>) {
        let dropped = inner.queue.len();
        if dropped > 0 {
            inner.queue.clear();
            self.shared
                .stats_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
            tracing::debug!(dropped, "discarded queued events on shutdown");
        }
    }

    /// Applies one event against the state it was dequeued in.
    fn dispatch(&self, event: &str, current: StateRef) {
        let target = self.shared.table.read().lookup(&current, event);

        let Some(target) = target else {
            self.shared.stats_unknown.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                state = current.name(),
                event,
                "unknown transition, state unchanged"
            );
            return;
        };

        self.run_hook(&current, HookKind::Exit);
        self.shared.inner.lock().current = target.clone();
        self.shared.progress.notify_all();
        self.run_hook(&target, HookKind::Enter);

        self.shared.stats_transitions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            from = current.name(),
            to = target.name(),
            event,
            "transition"
        );
    }

    /// Runs one hook, containing any panic so the worker keeps going.
    fn run_hook(&self, state: &StateRef, kind: HookKind) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| match kind {
            HookKind::Enter => state.enter(self),
            HookKind::Exit => state.exit(self),
        }));

        if let Err(panic_info) = result {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "hook panicked".to_string()
            };

            self.shared.stats_hook_panics.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                state = state.name(),
                hook = kind.as_str(),
                "hook panicked: {}",
                panic_msg
            );
        }
    }
}

/// A running state machine.
///
/// Owns the dispatch worker; dropping the `Fsm` stops and joins it.
pub struct Fsm {
    handle: FsmHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Fsm {
    /// Starts an engine in `initial` with default configuration.
    ///
    /// The initial state's enter hook is not run.
    pub fn new(initial: StateRef) -> Result<Self, CoreError> {
        Self::with_config(initial, EngineConfig::default())
    }

    /// Starts an engine in `initial` with the given configuration.
    pub fn with_config(initial: StateRef, config: EngineConfig) -> Result<Self, CoreError> {
        Self::start(initial, TransitionTable::new(), config)
    }

    /// Returns a builder that registers transitions before the worker starts.
    pub fn builder() -> FsmBuilder {
        FsmBuilder::default()
    }

    fn start(
        initial: StateRef,
        table: TransitionTable,
        config: EngineConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let worker_name = config.worker_name.clone();
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                current: initial,
                queue: VecDeque::new(),
                stop: false,
                in_flight: false,
                worker: WorkerState::Running,
            }),
            work: Condvar::new(),
            progress: Condvar::new(),
            table: RwLock::new(table),
            config,
            worker_thread: OnceLock::new(),
            stats_enqueued: AtomicU64::new(0),
            stats_refused: AtomicU64::new(0),
            stats_dropped: AtomicU64::new(0),
            stats_transitions: AtomicU64::new(0),
            stats_unknown: AtomicU64::new(0),
            stats_hook_panics: AtomicU64::new(0),
        });

        let handle = FsmHandle { shared };
        let worker_handle = handle.clone();
        let worker = thread::Builder::new()
            .name(worker_name)
            .spawn(move || worker_handle.run_worker())?;

        Ok(Self {
            handle,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Returns a cloneable handle for producer threads.
    pub fn handle(&self) -> FsmHandle {
        self.handle.clone()
    }

    /// Queues an event; see [`FsmHandle::trigger`].
    pub fn trigger(&self, event: impl Into<String>) {
        self.handle.trigger(event)
    }

    /// Queues an event, reporting refusal; see [`FsmHandle::try_trigger`].
    pub fn try_trigger(&self, event: impl Into<String>) -> Result<(), TriggerError> {
        self.handle.try_trigger(event)
    }

    /// Returns the name of the current state.
    pub fn current_state_name(&self) -> String {
        self.handle.current_state_name()
    }

    /// Returns the current state.
    pub fn current_state(&self) -> StateRef {
        self.handle.current_state()
    }

    /// Registers `from --event--> to`; see [`FsmHandle::add_transition`].
    pub fn add_transition(&self, from: &StateRef, event: impl Into<String>, to: &StateRef) {
        self.handle.add_transition(from, event, to)
    }

    /// Returns every registered edge as (from, event, to) names.
    pub fn transitions(&self) -> Vec<(String, String, String)> {
        self.handle.transitions()
    }

    /// Returns the events that have an edge out of the current state.
    pub fn available_events(&self) -> Vec<String> {
        self.handle.available_events()
    }

    /// Returns the number of queued, not yet dispatched, events.
    pub fn pending_events(&self) -> usize {
        self.handle.pending_events()
    }

    /// Returns the worker's lifecycle state.
    pub fn worker_state(&self) -> WorkerState {
        self.handle.worker_state()
    }

    /// Returns dispatch statistics.
    pub fn stats(&self) -> EngineStats {
        self.handle.stats()
    }

    /// Blocks until the queue is drained; see [`FsmHandle::wait_idle`].
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.handle.wait_idle(timeout)
    }

    /// Blocks until the state is named `name`; see [`FsmHandle::wait_for_state`].
    pub fn wait_for_state(&self, name: &str, timeout: Duration) -> bool {
        self.handle.wait_for_state(name, timeout)
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// An in-flight dispatch always completes. Queued events are dropped or
    /// drained according to [`ShutdownMode`]. Safe to call more than once.
    pub fn shutdown(&self) {
        self.handle.request_stop();

        if self.handle.is_worker_thread() {
            // Dropped from inside a hook; the worker exits on its own.
            tracing::warn!("FSM shut down from its own worker; not joining");
            return;
        }

        let Some(worker) = self.worker.lock().take() else {
            // Another caller is joining; wait for the worker to exit.
            self.handle
                .wait_on_progress(Duration::MAX, |inner| inner.worker == WorkerState::Stopped);
            return;
        };

        if worker.join().is_err() {
            tracing::error!("FSM worker thread panicked");
        }
    }
}

impl Drop for Fsm {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Collects an initial state, transitions and configuration before starting
/// the worker.
#[derive(Default)]
pub struct FsmBuilder {
    initial: Option<StateRef>,
    transitions: Vec<(StateRef, String, StateRef)>,
    config: EngineConfig,
}

impl FsmBuilder {
    /// Sets the state the engine starts in. Required.
    pub fn initial(mut self, state: &StateRef) -> Self {
        self.initial = Some(state.clone());
        self
    }

    /// Adds `from --event--> to`; a later edge for the same pair wins.
    pub fn transition(mut self, from: &StateRef, event: impl Into<String>, to: &StateRef) -> Self {
        self.transitions.push((from.clone(), event.into(), to.clone()));
        self
    }

    /// Replaces the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates everything, then starts the worker.
    ///
    /// Nothing is spawned if validation fails.
    pub fn build(self) -> Result<Fsm, CoreError> {
        let initial = self
            .initial
            .ok_or_else(|| CoreError::invalid("initial state not set"))?;

        let mut table = TransitionTable::new();
        for (from, event, to) in self.transitions {
            table.insert(&from, event, &to);
        }

        Fsm::start(initial, table, self.config)
    }
}
