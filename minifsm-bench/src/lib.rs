//! Shared fixtures for minifsm benchmarks.

use minifsm_core::{Fsm, State, StateRef};

/// Builds an engine that toggles idle <-> running on START / STOP.
pub fn toggle_engine() -> (Fsm, StateRef, StateRef) {
    let idle = State::new("idle").into_ref();
    let running = State::new("running").into_ref();
    let fsm = Fsm::builder()
        .initial(&idle)
        .transition(&idle, "START", &running)
        .transition(&running, "STOP", &idle)
        .build()
        .expect("bench engine");
    (fsm, idle, running)
}

/// Alternating START / STOP so every event takes a transition.
pub fn toggle_event(i: u64) -> &'static str {
    if i % 2 == 0 {
        "START"
    } else {
        "STOP"
    }
}
