//! Persistent state tree
//!
//! `Tree` is a clone-on-write key/value map: every mutating operation
//! returns a new tree and leaves prior snapshots untouched. Unchanged
//! subtrees are shared between snapshots via `Arc`, so cloning a tree
//! or holding onto an old snapshot is cheap.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A value stored in the state tree
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Tree(Tree),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Value::Tree(t) => Some(t),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s.as_str()))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Tree> for Value {
    fn from(t: Tree) -> Self {
        Value::Tree(t)
    }
}

/// An ordered sequence of keys addressing a nested value
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn new(segments: Vec<String>) -> Self {
        KeyPath { segments }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl From<&str> for KeyPath {
    fn from(key: &str) -> Self {
        KeyPath {
            segments: vec![key.to_string()],
        }
    }
}

impl From<String> for KeyPath {
    fn from(key: String) -> Self {
        KeyPath {
            segments: vec![key],
        }
    }
}

impl From<&[&str]> for KeyPath {
    fn from(keys: &[&str]) -> Self {
        KeyPath {
            segments: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(keys: [&str; N]) -> Self {
        KeyPath {
            segments: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(segments: Vec<String>) -> Self {
        KeyPath { segments }
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(path: &KeyPath) -> Self {
        path.clone()
    }
}

/// Persistent key/value tree with structural sharing
#[derive(Clone, Default, PartialEq)]
pub struct Tree {
    entries: Arc<BTreeMap<String, Value>>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Look up a top-level entry
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a nested entry; `None` if any segment is absent
    pub fn get_path(&self, path: &KeyPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.entries.get(first.as_str())?;
        for segment in rest {
            current = current.as_tree()?.get(segment.as_str())?;
        }
        Some(current)
    }

    /// New tree with `key` set to `value`
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Tree {
        let mut entries = self.entries.clone();
        Arc::make_mut(&mut entries).insert(key.into(), value.into());
        Tree { entries }
    }

    /// New tree with the value at `path` replaced, creating intermediate
    /// trees for absent segments. A non-tree intermediate value is
    /// replaced by a tree, matching set-in semantics.
    pub fn with_path(&self, path: &KeyPath, value: impl Into<Value>) -> Tree {
        self.with_segments(path.segments(), value.into())
    }

    fn with_segments(&self, segments: &[String], value: Value) -> Tree {
        match segments {
            [] => self.clone(),
            [key] => self.with(key.clone(), value),
            [key, rest @ ..] => {
                let child = match self.get(key) {
                    Some(Value::Tree(t)) => t.clone(),
                    _ => Tree::new(),
                };
                self.with(key.clone(), child.with_segments(rest, value))
            }
        }
    }

    /// New tree without `key`
    pub fn without(&self, key: &str) -> Tree {
        let mut entries = self.entries.clone();
        Arc::make_mut(&mut entries).remove(key);
        Tree { entries }
    }

    /// Shallow merge: entries of `other` overwrite entries of `self`
    pub fn merged(&self, other: &Tree) -> Tree {
        let mut entries = self.entries.clone();
        let map = Arc::make_mut(&mut entries);
        for (key, value) in other.iter() {
            map.insert(key.clone(), value.clone());
        }
        Tree { entries }
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Tree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tree {
            entries: Arc::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(Arc::from(s.as_str())),
            serde_json::Value::Array(items) => {
                Value::List(Arc::new(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Tree(Tree::from(map)),
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Tree {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Tree {
            entries: Arc::new(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => serde_json::Value::Array(
                items.iter().cloned().map(serde_json::Value::from).collect(),
            ),
            Value::Tree(t) => serde_json::Value::from(t),
        }
    }
}

impl From<Tree> for serde_json::Value {
    fn from(t: Tree) -> Self {
        serde_json::Value::Object(
            t.iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
                .collect(),
        )
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Tree(t) => t.serialize(serializer),
        }
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl<'de> Deserialize<'de> for Tree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Object(map) => Ok(Tree::from(map)),
            other => Err(serde::de::Error::custom(format!(
                "expected an object at the top level, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_with_and_get() {
        let tree = Tree::new().with("count", 3).with("label", "hello");
        assert_eq!(tree.get("count"), Some(&Value::Int(3)));
        assert_eq!(tree.get("label").and_then(Value::as_str), Some("hello"));
        assert_eq!(tree.get("missing"), None);
    }

    #[test]
    fn test_old_snapshots_unchanged() {
        let before = Tree::new().with("a", 1);
        let after = before.with("a", 2).with("b", 3);

        assert_eq!(before.get("a"), Some(&Value::Int(1)));
        assert!(!before.contains_key("b"));
        assert_eq!(after.get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_with_path_creates_intermediates() {
        let path = KeyPath::from(["a", "b", "c"]);
        let tree = Tree::new().with_path(&path, 42);
        assert_eq!(tree.get_path(&path), Some(&Value::Int(42)));
        assert!(tree.get("a").unwrap().as_tree().is_some());
    }

    #[test]
    fn test_get_path_absent_segment() {
        let tree = Tree::new().with("a", Tree::new().with("b", 1));
        assert_eq!(tree.get_path(&KeyPath::from(["a", "x"])), None);
        assert_eq!(tree.get_path(&KeyPath::from(["x", "b"])), None);
        assert_eq!(tree.get_path(&KeyPath::default()), None);
    }

    #[test]
    fn test_merged_is_shallow_right_wins() {
        let base = Tree::new()
            .with("kept", 1)
            .with("sub", Tree::new().with("x", 1).with("y", 2));
        let patch = Tree::new()
            .with("sub", Tree::new().with("x", 9))
            .with("added", true);

        let merged = base.merged(&patch);
        assert_eq!(merged.get("kept"), Some(&Value::Int(1)));
        assert_eq!(merged.get("added"), Some(&Value::Bool(true)));
        // shallow: the whole subtree is replaced, "y" does not survive
        let sub = merged.get("sub").unwrap().as_tree().unwrap();
        assert_eq!(sub.get("x"), Some(&Value::Int(9)));
        assert_eq!(sub.get("y"), None);
    }

    #[test]
    fn test_without() {
        let tree = Tree::new().with("a", 1).with("b", 2);
        let trimmed = tree.without("a");
        assert!(!trimmed.contains_key("a"));
        assert!(tree.contains_key("a"));
    }

    #[test]
    fn test_json_round_trip() {
        let tree = Tree::new()
            .with("n", 7)
            .with("f", 1.5)
            .with("s", "text")
            .with("nested", Tree::new().with("flag", true))
            .with("items", vec![Value::Int(1), Value::Null]);

        let json = serde_json::to_string(&tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }

    #[test]
    fn test_tree_rejects_non_object_json() {
        let err = serde_json::from_str::<Tree>("[1, 2]");
        assert!(err.is_err());
    }

    proptest! {
        #[test]
        fn prop_with_path_then_get_path(
            segments in prop::collection::vec("[a-z]{1,8}", 1..5),
            value in any::<i64>(),
        ) {
            let path = KeyPath::from(segments);
            // "_sibling" cannot collide with the generated [a-z] keys
            let tree = Tree::new().with("_sibling", 0).with_path(&path, value);
            prop_assert_eq!(tree.get_path(&path), Some(&Value::Int(value)));
            prop_assert_eq!(tree.get("_sibling"), Some(&Value::Int(0)));
        }
    }
}
