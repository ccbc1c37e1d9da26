//! Shared event bus
//!
//! A synchronous publish/subscribe dispatcher keyed by action
//! identifiers plus one reserved key for the global "state changed"
//! broadcast. Listeners run in registration order with no per-listener
//! isolation: a panicking listener propagates to whoever emitted.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_core::{ActionId, Value};

/// Listener invoked with the dispatched payload and the optional
/// target-store scope
pub type BusListener = Arc<dyn Fn(&Value, Option<&str>) + Send + Sync>;

/// Key a listener is registered under
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// A dispatched action
    Action(ActionId),
    /// The reserved global state-change broadcast
    StateChange,
}

/// Listener registry; emission itself happens at the context layer so
/// no lock is held while user callbacks run
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKey, Vec<BusListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Register a listener under `key`, after all existing listeners
    pub fn on(&mut self, key: EventKey, listener: BusListener) {
        self.listeners.entry(key).or_default().push(listener);
    }

    /// Snapshot of the listeners for `key`, in registration order
    pub fn listeners(&self, key: &EventKey) -> Vec<BusListener> {
        self.listeners.get(key).cloned().unwrap_or_default()
    }

    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.listeners.get(key).map(Vec::len).unwrap_or(0)
    }

    /// Drop every registered listener
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
