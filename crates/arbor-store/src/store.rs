//! Store façade
//!
//! A `Store` is a cheap-to-clone handle bound to one namespace of the
//! global state tree. It exposes reads, the two write shapes, action
//! listeners, subscriptions and the optional per-key accessors. The
//! store composes the shared event bus through its context rather than
//! inheriting any emitter implementation.

use std::fmt;
use std::sync::Arc;

use arbor_core::{ActionId, ArborError, ArborResult, KeyPath, Tree, Value};

use crate::config::NotifyFn;
use crate::context::Arbor;

/// Notify contract subscribers must implement
///
/// Replaces the "has a force-update method" shape check of classic
/// Flux containers with an explicit capability.
pub trait Subscriber: Send + Sync {
    fn refresh(&self);
}

/// One subscription: the subscriber reference is used only for
/// identity comparison during unsubscribe, never invoked except
/// through the paired notify function
pub(crate) struct SubscriberRecord {
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) notify: NotifyFn,
}

/// Identity comparison by allocation (data pointer), ignoring vtables
pub(crate) fn same_subscriber(a: &dyn Subscriber, b: &dyn Subscriber) -> bool {
    std::ptr::eq(
        a as *const dyn Subscriber as *const (),
        b as *const dyn Subscriber as *const (),
    )
}

/// Handle to one named namespace of the state tree
#[derive(Clone)]
pub struct Store {
    name: Arc<str>,
    ctx: Arbor,
}

impl Store {
    pub(crate) fn handle(name: &str, ctx: Arbor) -> Self {
        Store {
            name: Arc::from(name),
            ctx,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle still refers to a registered store
    pub fn exists(&self) -> bool {
        self.ctx.has_store(&self.name)
    }

    /// Read the value at `path`, falling back to `default` when any
    /// segment is absent. Pure read, no side effect.
    pub fn get(&self, path: impl Into<KeyPath>, default: impl Into<Value>) -> ArborResult<Value> {
        Ok(self.try_get(path)?.unwrap_or_else(|| default.into()))
    }

    /// Read the value at `path`; `None` when any segment is absent.
    /// An empty path is an `InvalidPath` error.
    pub fn try_get(&self, path: impl Into<KeyPath>) -> ArborResult<Option<Value>> {
        let path = path.into();
        if path.is_empty() {
            return Err(ArborError::InvalidPath("path must contain at least one key"));
        }
        Ok(self
            .ctx
            .read_slice(&self.name)
            .and_then(|slice| slice.get_path(&path).cloned()))
    }

    /// Targeted write: set the value at `path`, creating intermediate
    /// trees for absent segments. Schedules a change notification per
    /// the active notify policy.
    pub fn set(&self, path: impl Into<KeyPath>, value: impl Into<Value>) -> ArborResult<()> {
        let path = path.into();
        if path.is_empty() {
            return Err(ArborError::InvalidPath("path must contain at least one key"));
        }
        let value = value.into();
        self.ctx.write(&self.name, |slice| slice.with_path(&path, value));
        Ok(())
    }

    /// Whole-slice write: `f` receives the current subtree and returns
    /// its replacement, enabling atomic multi-field updates
    pub fn update(&self, f: impl FnOnce(Tree) -> Tree) {
        self.ctx.write(&self.name, f);
    }

    /// Subscribe `handler` to `action`; it receives this store and the
    /// dispatched payload, regardless of dispatch scope
    pub fn add_listener(
        &self,
        action: &ActionId,
        handler: impl Fn(&Store, &Value) + Send + Sync + 'static,
    ) {
        let store = self.clone();
        self.ctx.on_action(
            action.clone(),
            Arc::new(move |payload, _scope| handler(&store, payload)),
        );
    }

    /// Like [`Store::add_listener`], but the handler runs only when
    /// the dispatch was explicitly scoped to this store's name;
    /// unscoped dispatches never match
    pub fn add_targeted_listener(
        &self,
        action: &ActionId,
        handler: impl Fn(&Store, &Value) + Send + Sync + 'static,
    ) {
        let store = self.clone();
        self.ctx.on_action(
            action.clone(),
            Arc::new(move |payload, scope| {
                if scope == Some(store.name()) {
                    handler(&store, payload);
                }
            }),
        );
    }

    /// Merge `data` into this store's slice, once: the first call
    /// wins and every later call is a no-op. When the configuration
    /// enables it, an accessor is registered for every top-level key
    /// of `data` (see [`Store::accessor`]).
    pub fn set_initial_data(&self, data: impl Into<Tree>) {
        let data = data.into();
        let keys: Vec<String> = data.keys().cloned().collect();
        if !self.ctx.mark_initial(&self.name, keys) {
            return;
        }
        self.update(|slice| slice.merged(&data));
    }

    /// Accessor registered by [`Store::set_initial_data`] for `key`,
    /// or `None` when no accessor was registered for it
    pub fn accessor(&self, key: &str) -> Option<Accessor> {
        let (readable, writable) = self.ctx.accessor_entry(&self.name, key)?;
        Some(Accessor {
            store: self.clone(),
            key: key.to_string(),
            readable,
            writable,
        })
    }

    /// Subscribe with the configured default notify function
    /// (captured now; a later `configure` affects only new
    /// subscriptions)
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.ctx.subscribe(&self.name, subscriber, None);
    }

    /// Subscribe with an explicit notify function
    pub fn subscribe_with(&self, subscriber: Arc<dyn Subscriber>, notify: NotifyFn) {
        self.ctx.subscribe(&self.name, subscriber, Some(notify));
    }

    /// Remove every subscription whose subscriber is the same
    /// allocation as `subscriber`
    pub fn unsubscribe(&self, subscriber: &dyn Subscriber) {
        self.ctx.unsubscribe(&self.name, subscriber);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Store({})", self.name)
    }
}

/// Generated accessor pair for one top-level key of a store
///
/// Reads and writes go through `Store::get`/`Store::set`, so accessors
/// always agree with the canonical state tree. Which sides are present
/// follows the `create_getters`/`create_setters` toggles in effect
/// when the initial data was set.
pub struct Accessor {
    store: Store,
    key: String,
    readable: bool,
    writable: bool,
}

impl Accessor {
    /// Current value under the key; `None` when reading is disabled or
    /// the key is absent
    pub fn get(&self) -> Option<Value> {
        if !self.readable {
            return None;
        }
        self.store.try_get(self.key.as_str()).ok().flatten()
    }

    /// Write a value under the key; false when writing is disabled
    pub fn set(&self, value: impl Into<Value>) -> bool {
        if !self.writable {
            return false;
        }
        self.store.set(self.key.as_str(), value).is_ok()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("store", &self.store.name())
            .field("key", &self.key)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::Config;

    use super::*;

    #[derive(Default)]
    struct Probe {
        hits: AtomicUsize,
    }

    impl Subscriber for Probe {
        fn refresh(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn seeded(name: &str) -> (Arbor, Store) {
        let arbor = Arbor::new();
        let store = arbor.create_store(name).unwrap();
        (arbor, store)
    }

    #[test]
    fn test_set_then_get() {
        let (_arbor, store) = seeded("kv");
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k", Value::Null).unwrap().as_str(), Some("v"));
        assert_eq!(
            store.get("missing", "default").unwrap().as_str(),
            Some("default")
        );
    }

    #[test]
    fn test_nested_path_get() {
        let (_arbor, store) = seeded("nested");
        store.set_initial_data(Tree::from_iter([("a", Tree::from_iter([("b", 42)]))]));
        assert_eq!(store.get(["a", "b"], Value::Null).unwrap(), Value::Int(42));
        assert_eq!(store.try_get(["a", "x"]).unwrap(), None);
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let (_arbor, store) = seeded("strict");
        let empty = KeyPath::default();
        assert!(matches!(
            store.try_get(&empty),
            Err(ArborError::InvalidPath(_))
        ));
        assert!(matches!(
            store.set(Vec::<String>::new(), 1),
            Err(ArborError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_update_replaces_whole_slice() {
        let (_arbor, store) = seeded("bulk");
        store.set("keep", 1).unwrap();
        store.update(|slice| slice.with("a", 10).with("b", 20));
        assert_eq!(store.get("keep", Value::Null).unwrap(), Value::Int(1));
        assert_eq!(store.get("a", Value::Null).unwrap(), Value::Int(10));
        assert_eq!(store.get("b", Value::Null).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_set_initial_data_is_write_once() {
        let (_arbor, store) = seeded("once");
        store.set_initial_data(Tree::from_iter([("count", 1)]));
        store.set_initial_data(Tree::from_iter([("count", 99), ("extra", 5)]));

        assert_eq!(store.get("count", Value::Null).unwrap(), Value::Int(1));
        assert_eq!(store.try_get("extra").unwrap(), None);
    }

    #[test]
    fn test_accessors_follow_config_toggles() {
        let arbor = Arbor::new();
        let store = arbor.create_store("acc").unwrap();
        store.set_initial_data(Tree::from_iter([("count", 1)]));

        let accessor = store.accessor("count").unwrap();
        assert_eq!(accessor.get(), Some(Value::Int(1)));
        assert!(accessor.set(2));
        assert_eq!(store.get("count", Value::Null).unwrap(), Value::Int(2));
        // accessors stay consistent with the tree after a direct write
        store.set("count", 3).unwrap();
        assert_eq!(accessor.get(), Some(Value::Int(3)));

        assert!(store.accessor("unknown").is_none());
    }

    #[test]
    fn test_accessors_disabled() {
        let arbor = Arbor::new();
        arbor.configure(Config {
            create_getters: false,
            create_setters: false,
            ..Config::default()
        });
        let store = arbor.create_store("plain").unwrap();
        store.set_initial_data(Tree::from_iter([("count", 1)]));
        assert!(store.accessor("count").is_none());
    }

    #[test]
    fn test_setters_only() {
        let arbor = Arbor::new();
        arbor.configure(Config {
            create_getters: false,
            ..Config::default()
        });
        let store = arbor.create_store("wo").unwrap();
        store.set_initial_data(Tree::from_iter([("count", 1)]));

        let accessor = store.accessor("count").unwrap();
        assert_eq!(accessor.get(), None);
        assert!(accessor.set(7));
        assert_eq!(store.get("count", Value::Null).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_unsubscribe_removes_by_identity() {
        let (_arbor, store) = seeded("subs");
        let kept = Arc::new(Probe::default());
        let dropped = Arc::new(Probe::default());
        store.subscribe(kept.clone());
        store.subscribe(dropped.clone());
        store.subscribe(dropped.clone()); // duplicate record, same identity

        store.unsubscribe(dropped.as_ref());
        store.set("k", 1).unwrap();

        assert_eq!(kept.hits.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_with_custom_notify() {
        let (_arbor, store) = seeded("custom");
        let probe = Arc::new(Probe::default());
        let custom_calls = Arc::new(AtomicUsize::new(0));
        {
            let custom_calls = custom_calls.clone();
            store.subscribe_with(
                probe.clone(),
                Arc::new(move |subscriber| {
                    custom_calls.fetch_add(1, Ordering::SeqCst);
                    subscriber.refresh();
                }),
            );
        }

        store.set("k", 1).unwrap();
        assert_eq!(custom_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_handle_after_destroy() {
        let arbor = Arbor::new();
        let store = arbor.create_store("gone").unwrap();
        assert!(store.exists());
        arbor.destroy_store("gone");

        assert!(!store.exists());
        store.set("k", 1).unwrap(); // ignored
        assert_eq!(store.try_get("k").unwrap(), None);
        assert!(!arbor.state().contains_key("gone"));
    }
}
