//! Context configuration

use std::fmt;
use std::sync::Arc;

use crate::store::Subscriber;

/// Function used to notify a subscriber after its store changed
pub type NotifyFn = Arc<dyn Fn(&dyn Subscriber) + Send + Sync>;

/// When change notifications are delivered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// Every write notifies before it returns
    Immediate,
    /// Writes coalesce; [`crate::Arbor::flush`] delivers one broadcast
    /// for everything written since the last flush
    Deferred,
}

/// Process-wide settings for one [`crate::Arbor`] context
///
/// Replaced wholesale by [`crate::Arbor::configure`]; there is no merge.
#[derive(Clone)]
pub struct Config {
    /// Notify function used by `Store::subscribe` when the caller does
    /// not supply one; captured at subscribe time
    pub default_notify: NotifyFn,
    /// Register read accessors for initial-data keys
    pub create_getters: bool,
    /// Register write accessors for initial-data keys
    pub create_setters: bool,
    pub notify_policy: NotifyPolicy,
}

impl Config {
    /// Default settings with deferred (coalescing) notifications
    pub fn deferred() -> Self {
        Config {
            notify_policy: NotifyPolicy::Deferred,
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_notify: Arc::new(|subscriber| subscriber.refresh()),
            create_getters: true,
            create_setters: true,
            notify_policy: NotifyPolicy::Immediate,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("create_getters", &self.create_getters)
            .field("create_setters", &self.create_setters)
            .field("notify_policy", &self.notify_policy)
            .finish_non_exhaustive()
    }
}
