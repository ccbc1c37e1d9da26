//! Arbor context - the composition root
//!
//! One `Arbor` owns everything the engine shares: the global state
//! tree, the store registry, the event bus, the pending-notification
//! queue, and the configuration. Applications construct one context
//! per instance instead of relying on process-wide statics, which
//! allows independent contexts side by side and clean test isolation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arbor_core::{ActionId, ArborError, ArborResult, Tree, Value};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bus::{BusListener, EventBus, EventKey};
use crate::config::{Config, NotifyFn, NotifyPolicy};
use crate::store::{same_subscriber, Store, Subscriber, SubscriberRecord};

/// Per-store bookkeeping held by the registry
///
/// The registry is a lookup table, not an owner: `Store` values are
/// cheap handles and whoever constructed one keeps using it.
#[derive(Default)]
pub(crate) struct StoreRecord {
    pub(crate) subscribers: Vec<SubscriberRecord>,
    /// Write-once sentinel for `Store::set_initial_data`
    pub(crate) initial_data_set: bool,
    pub(crate) accessor_keys: Vec<String>,
    pub(crate) accessor_getters: bool,
    pub(crate) accessor_setters: bool,
}

pub(crate) struct ContextInner {
    /// Global state: store name -> per-store subtree
    pub(crate) state: Tree,
    pub(crate) registry: BTreeMap<String, StoreRecord>,
    pub(crate) bus: EventBus,
    /// Stores written since the last flush, in first-write order.
    /// Non-empty means a broadcast is pending; at most one broadcast
    /// is ever pending no matter how many writes accumulate.
    pub(crate) dirty: Vec<String>,
    pub(crate) config: Config,
}

/// Subscriber notifications captured under the lock, delivered after
type NotifyBatch = Vec<(Arc<dyn Subscriber>, NotifyFn)>;

fn snapshot_subscribers(record: &StoreRecord) -> NotifyBatch {
    record
        .subscribers
        .iter()
        .map(|r| (r.subscriber.clone(), r.notify.clone()))
        .collect()
}

/// Handle to one state/event context; `Clone` shares the same context
#[derive(Clone)]
pub struct Arbor {
    inner: Arc<Mutex<ContextInner>>,
}

impl Arbor {
    pub fn new() -> Self {
        Arbor::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Arbor {
            inner: Arc::new(Mutex::new(ContextInner {
                state: Tree::new(),
                registry: BTreeMap::new(),
                bus: EventBus::new(),
                dirty: Vec::new(),
                config,
            })),
        }
    }

    /// Create a store owning the `name` namespace of the state tree.
    ///
    /// Fails with `NameConflict` if the name is already present in the
    /// global state; the subtree and the registry record are inserted
    /// atomically.
    pub fn create_store(&self, name: &str) -> ArborResult<Store> {
        {
            let mut inner = self.inner.lock();
            if inner.state.contains_key(name) {
                return Err(ArborError::NameConflict(name.to_string()));
            }
            inner.state = inner.state.with(name, Tree::new());
            inner.registry.insert(name.to_string(), StoreRecord::default());
        }
        debug!(store = name, "store created");
        Ok(Store::handle(name, self.clone()))
    }

    /// Broadcast `action` to every listener registered for it.
    ///
    /// `scope` optionally targets one store by name and fails with
    /// `TargetNotFound` when no such store exists; delivery is then
    /// all-or-nothing. This is the sole entry point by which external
    /// callers trigger store mutations.
    pub fn dispatch(
        &self,
        action: &ActionId,
        payload: impl Into<Value>,
        scope: Option<&str>,
    ) -> ArborResult<()> {
        let payload = payload.into();
        let listeners = {
            let inner = self.inner.lock();
            if let Some(name) = scope {
                if !inner.state.contains_key(name) {
                    return Err(ArborError::TargetNotFound(name.to_string()));
                }
            }
            inner.bus.listeners(&EventKey::Action(action.clone()))
        };
        debug!(action = action.label(), scope, listeners = listeners.len(), "dispatch");
        for listener in &listeners {
            listener(&payload, scope);
        }
        Ok(())
    }

    /// Look up a registered store by name
    pub fn get_store(&self, name: &str) -> Option<Store> {
        let inner = self.inner.lock();
        inner
            .registry
            .contains_key(name)
            .then(|| Store::handle(name, self.clone()))
    }

    /// Remove a store's state subtree and registry record.
    ///
    /// Idempotent: returns whether a store (or hydrated entry) existed
    /// to remove. The name becomes available for reuse.
    pub fn destroy_store(&self, name: &str) -> bool {
        let existed = {
            let mut inner = self.inner.lock();
            let existed = inner.state.contains_key(name) || inner.registry.contains_key(name);
            inner.state = inner.state.without(name);
            inner.registry.remove(name);
            inner.dirty.retain(|d| d != name);
            existed
        };
        if existed {
            debug!(store = name, "store destroyed");
        } else {
            warn!(store = name, "destroy of nonexistent store");
        }
        existed
    }

    /// Merge an externally supplied tree into the global state at the
    /// top level, bypassing store constructors and store writes
    pub fn hydrate(&self, snapshot: impl Into<Tree>) {
        let snapshot = snapshot.into();
        let mut inner = self.inner.lock();
        inner.state = inner.state.merged(&snapshot);
        debug!(entries = snapshot.len(), "hydrated global state");
    }

    /// Persistent snapshot of the whole state tree; later writes do
    /// not affect it
    pub fn state(&self) -> Tree {
        self.inner.lock().state.clone()
    }

    /// Register a callback for the global state-change broadcast
    pub fn on_state_change(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner
            .lock()
            .bus
            .on(EventKey::StateChange, Arc::new(move |_, _| callback()));
    }

    /// Replace the configuration wholesale (no merge)
    pub fn configure(&self, config: Config) {
        self.inner.lock().config = config;
    }

    /// Deliver everything deferred since the last flush: one
    /// state-change broadcast, then every subscriber of every written
    /// store exactly once, stores in first-write order and subscribers
    /// in subscription order. Returns false when nothing was pending.
    pub fn flush(&self) -> bool {
        let (listeners, batches) = {
            let mut inner = self.inner.lock();
            if inner.dirty.is_empty() {
                return false;
            }
            let dirty = std::mem::take(&mut inner.dirty);
            let listeners = inner.bus.listeners(&EventKey::StateChange);
            let batches: Vec<NotifyBatch> = dirty
                .iter()
                .filter_map(|name| inner.registry.get(name))
                .map(snapshot_subscribers)
                .collect();
            (listeners, batches)
        };
        debug!(stores = batches.len(), "flush");
        for listener in &listeners {
            listener(&Value::Null, None);
        }
        for batch in batches {
            for (subscriber, notify) in batch {
                notify(subscriber.as_ref());
            }
        }
        true
    }

    /// Explicit teardown: drops every store, listener, subscriber and
    /// the whole state tree. Live `Store` handles become inert no-ops.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.bus.clear();
        inner.registry.clear();
        inner.state = Tree::new();
        inner.dirty.clear();
        debug!("context shut down");
    }

    pub(crate) fn has_store(&self, name: &str) -> bool {
        self.inner.lock().registry.contains_key(name)
    }

    pub(crate) fn read_slice(&self, name: &str) -> Option<Tree> {
        let inner = self.inner.lock();
        match inner.state.get(name) {
            Some(Value::Tree(t)) => Some(t.clone()),
            _ => None,
        }
    }

    /// Commit a write to one store's slice and schedule notification
    /// per the active policy. The updater runs without the lock held,
    /// so handlers may re-enter the context freely.
    pub(crate) fn write(&self, name: &str, f: impl FnOnce(Tree) -> Tree) {
        if !self.has_store(name) {
            warn!(store = name, "write on a destroyed store ignored");
            return;
        }
        let next = f(self.read_slice(name).unwrap_or_default());

        let immediate = {
            let mut inner = self.inner.lock();
            if !inner.registry.contains_key(name) {
                warn!(store = name, "write on a destroyed store ignored");
                return;
            }
            inner.state = inner.state.with(name, next);
            match inner.config.notify_policy {
                NotifyPolicy::Deferred => {
                    if !inner.dirty.iter().any(|d| d == name) {
                        inner.dirty.push(name.to_string());
                    }
                    None
                }
                NotifyPolicy::Immediate => Some((
                    inner.bus.listeners(&EventKey::StateChange),
                    inner
                        .registry
                        .get(name)
                        .map(snapshot_subscribers)
                        .unwrap_or_default(),
                )),
            }
        };

        if let Some((listeners, batch)) = immediate {
            for listener in &listeners {
                listener(&Value::Null, None);
            }
            for (subscriber, notify) in batch {
                notify(subscriber.as_ref());
            }
        }
    }

    pub(crate) fn on_action(&self, action: ActionId, listener: BusListener) {
        self.inner.lock().bus.on(EventKey::Action(action), listener);
    }

    pub(crate) fn subscribe(
        &self,
        name: &str,
        subscriber: Arc<dyn Subscriber>,
        notify: Option<NotifyFn>,
    ) {
        let mut inner = self.inner.lock();
        let notify = notify.unwrap_or_else(|| inner.config.default_notify.clone());
        if let Some(record) = inner.registry.get_mut(name) {
            record.subscribers.push(SubscriberRecord { subscriber, notify });
        }
    }

    pub(crate) fn unsubscribe(&self, name: &str, subscriber: &dyn Subscriber) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.registry.get_mut(name) {
            record
                .subscribers
                .retain(|r| !same_subscriber(r.subscriber.as_ref(), subscriber));
        }
    }

    /// First call records the write-once sentinel (and the accessor
    /// keys when enabled) and returns true; later calls return false.
    pub(crate) fn mark_initial(&self, name: &str, keys: Vec<String>) -> bool {
        let mut inner = self.inner.lock();
        let (getters, setters) = (inner.config.create_getters, inner.config.create_setters);
        let Some(record) = inner.registry.get_mut(name) else {
            return false;
        };
        if record.initial_data_set {
            return false;
        }
        record.initial_data_set = true;
        if getters || setters {
            record.accessor_keys = keys;
            record.accessor_getters = getters;
            record.accessor_setters = setters;
        }
        true
    }

    pub(crate) fn accessor_entry(&self, name: &str, key: &str) -> Option<(bool, bool)> {
        let inner = self.inner.lock();
        let record = inner.registry.get(name)?;
        if !record.accessor_keys.iter().any(|k| k == key) {
            return None;
        }
        Some((record.accessor_getters, record.accessor_setters))
    }
}

impl Default for Arbor {
    fn default() -> Self {
        Arbor::new()
    }
}

impl fmt::Debug for Arbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Arbor")
            .field("stores", &inner.registry.len())
            .field("pending", &!inner.dirty.is_empty())
            .finish()
    }
}
