//! Transition table keyed by source state identity, then event name.

use crate::state::{StateId, StateRef};
use std::collections::HashMap;

/// A registered edge of the automaton.
#[derive(Debug, Clone)]
struct Edge {
    /// Kept so every state the table mentions outlives the table.
    from: StateRef,
    to: StateRef,
}

/// Maps (source state, event) to a target state.
///
/// States are keyed by [`StateId`], never by name, so two states sharing a
/// name have independent transitions.
#[derive(Debug, Default)]
pub struct TransitionTable {
    edges: HashMap<StateId, HashMap<String, Edge>>,
}

impl TransitionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `from --event--> to`.
    ///
    /// Registering the same (source, event) pair again replaces the target;
    /// the displaced target is returned.
    pub fn insert(
        &mut self,
        from: &StateRef,
        event: impl Into<String>,
        to: &StateRef,
    ) -> Option<StateRef> {
        let edge = Edge {
            from: from.clone(),
            to: to.clone(),
        };
        self.edges
            .entry(from.id())
            .or_default()
            .insert(event.into(), edge)
            .map(|old| old.to)
    }

    /// Looks up the target for the given state and event.
    pub fn lookup(&self, state: &StateRef, event: &str) -> Option<StateRef> {
        self.edges
            .get(&state.id())
            .and_then(|events| events.get(event))
            .map(|edge| edge.to.clone())
    }

    /// Returns all events registered from the given state, sorted.
    pub fn events_from(&self, state: &StateRef) -> Vec<&str> {
        let mut events: Vec<&str> = self
            .edges
            .get(&state.id())
            .map(|events| events.keys().map(String::as_str).collect())
            .unwrap_or_default();
        events.sort_unstable();
        events
    }

    /// Returns every edge as (from name, event, to name), sorted by source
    /// name then event.
    pub fn edges(&self) -> Vec<(&str, &str, &str)> {
        let mut edges: Vec<(&str, &str, &str)> = self
            .edges
            .values()
            .flat_map(|events| events.iter())
            .map(|(event, edge)| (edge.from.name(), event.as_str(), edge.to.name()))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Number of registered edges.
    pub fn len(&self) -> usize {
        self.edges.values().map(HashMap::len).sum()
    }

    /// Whether no edge is registered.
    pub fn is_empty(&self) -> bool {
        self.edges.values().all(HashMap::is_empty)
    }
}
