//! Action identifiers
//!
//! Actions are opaque tokens representing an intent to mutate state.
//! Each identifier is minted from a human-readable label but compared
//! by a process-unique token, so two actions created from the same
//! label are never equal and unrelated features cannot cross-wire by
//! picking the same name.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique action identifier
#[derive(Clone)]
pub struct ActionId {
    token: u64,
    label: Arc<str>,
}

impl ActionId {
    /// Mint a fresh identifier; every call yields a distinct token
    pub fn new(label: &str) -> Self {
        ActionId {
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            label: Arc::from(label),
        }
    }

    /// The label this identifier was minted from (diagnostic only)
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl PartialEq for ActionId {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for ActionId {}

impl Hash for ActionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({}#{})", self.label, self.token)
    }
}

/// Labelled set of action identifiers, as returned by [`make_actions`]
#[derive(Clone, Debug, Default)]
pub struct ActionSet {
    actions: BTreeMap<String, ActionId>,
}

impl ActionSet {
    pub fn get(&self, label: &str) -> Option<&ActionId> {
        self.actions.get(label)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActionId)> {
        self.actions.iter()
    }
}

impl Index<&str> for ActionSet {
    type Output = ActionId;

    fn index(&self, label: &str) -> &ActionId {
        self.actions
            .get(label)
            .unwrap_or_else(|| panic!("no action labelled '{label}'"))
    }
}

/// Mint one unique identifier per label
pub fn make_actions<I, S>(labels: I) -> ActionSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ActionSet {
        actions: labels
            .into_iter()
            .map(|label| {
                let label = label.as_ref();
                (label.to_string(), ActionId::new(label))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_label_never_equal() {
        let a = ActionId::new("save");
        let b = ActionId::new("save");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_make_actions_lookup() {
        let actions = make_actions(["load", "save"]);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions["load"].label(), "load");
        assert!(actions.get("missing").is_none());

        let again = make_actions(["save"]);
        assert_ne!(actions["save"], again["save"]);
    }

    #[test]
    #[should_panic(expected = "no action labelled")]
    fn test_index_unknown_label_panics() {
        let actions = make_actions(["only"]);
        let _ = &actions["other"];
    }
}
