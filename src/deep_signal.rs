use std::{
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use indexmap::IndexMap;

use crate::{batch, untracked, SignalContext, State, Value};

mod access;

pub use access::*;


static NEXT_ARRAY_KEY: AtomicU64 = AtomicU64::new(0);

/// Mints a stable key for a new array element.
///
/// Keys are unique for the lifetime of the process and are never reassigned.
pub fn next_array_key() -> u64 {
    NEXT_ARRAY_KEY.fetch_add(1, Ordering::Relaxed)
}

pub type DeepObject = Rc<IndexMap<String, DeepSignal>>;
pub type DeepArray = Rc<Vec<ArrayEntry>>;

/// The content of one reactive container.
#[derive(Clone)]
pub enum DeepNode {
    /// A primitive, a date, or `Null`.
    Value(Value),
    Object(DeepObject),
    Array(DeepArray),
}

/// One element of a reactive array.
///
/// `key` identifies the element across inserts, removals and reorders.
#[derive(Clone)]
pub struct ArrayEntry {
    pub key: u64,
    pub signal: DeepSignal,
}
impl ArrayEntry {
    pub fn new(value: &Value) -> Self {
        Self {
            key: next_array_key(),
            signal: signalify(value),
        }
    }
}

/// A reactive mirror of a [`Value`].
///
/// Every object and array level is its own observable cell, so a write only notifies
/// readers of the subtree it touches.
#[derive(Clone)]
pub struct DeepSignal(State<DeepNode>);

/// Converts a plain value into a tree of reactive containers.
pub fn signalify(value: &Value) -> DeepSignal {
    DeepSignal(State::new(node_from_value(value)))
}

fn node_from_value(value: &Value) -> DeepNode {
    match value {
        Value::Array(items) => DeepNode::Array(Rc::new(items.iter().map(ArrayEntry::new).collect())),
        Value::Object(map) => DeepNode::Object(Rc::new(
            map.iter().map(|(k, v)| (k.clone(), signalify(v))).collect(),
        )),
        _ => DeepNode::Value(value.clone()),
    }
}

impl DeepSignal {
    pub fn new(value: &Value) -> Self {
        signalify(value)
    }

    /// The node of this container, without subscribing.
    pub fn node(&self) -> DeepNode {
        self.0.peek()
    }

    /// The node of this container, subscribing to this level only.
    pub fn node_tracked(&self, sc: &mut SignalContext) -> DeepNode {
        self.0.get(sc)
    }

    pub fn is_array(&self) -> bool {
        self.0.with_peek(|n| matches!(n, DeepNode::Array(_)))
    }
    pub fn is_object(&self) -> bool {
        self.0.with_peek(|n| matches!(n, DeepNode::Object(_)))
    }

    /// The element keys of an array container. Empty for other containers.
    pub fn array_keys(&self) -> Vec<u64> {
        self.0.with_peek(|n| match n {
            DeepNode::Array(entries) => entries.iter().map(|e| e.key).collect(),
            _ => Vec::new(),
        })
    }

    /// The plain value of this tree, without subscribing.
    pub fn unsignalify(&self) -> Value {
        untracked(|sc| self.get(sc))
    }

    /// The plain value of this tree, subscribing to every level it traverses.
    pub fn get(&self, sc: &mut SignalContext) -> Value {
        match &*self.0.borrow(sc) {
            DeepNode::Value(value) => value.clone(),
            DeepNode::Object(map) => {
                Value::Object(map.iter().map(|(k, s)| (k.clone(), s.get(sc))).collect())
            }
            DeepNode::Array(entries) => entries.iter().map(|e| e.signal.get(sc)).collect(),
        }
    }

    /// Replaces the whole content with a freshly signalified value.
    pub fn replace(&self, value: &Value) {
        self.set_node(node_from_value(value));
    }

    pub(crate) fn set_node(&self, node: DeepNode) {
        self.0.set(node);
    }

    /// Writes `value` through the existing tree.
    ///
    /// Containers whose shape still matches are kept, array elements keep their keys by position,
    /// and unchanged leaves are not notified.
    pub fn assign(&self, value: &Value) {
        batch(|| self.assign_raw(value))
    }
    fn assign_raw(&self, value: &Value) {
        let node = self.node();
        match (node, value) {
            (DeepNode::Object(map), Value::Object(values)) => {
                let same_keys =
                    map.len() == values.len() && values.keys().all(|k| map.contains_key(k));
                if same_keys {
                    for (k, v) in values {
                        map[k].assign_raw(v);
                    }
                } else {
                    let mut new_map = IndexMap::with_capacity(values.len());
                    for (k, v) in values {
                        let child = match map.get(k) {
                            Some(child) => {
                                child.assign_raw(v);
                                child.clone()
                            }
                            None => signalify(v),
                        };
                        new_map.insert(k.clone(), child);
                    }
                    self.set_node(DeepNode::Object(Rc::new(new_map)));
                }
            }
            (DeepNode::Array(entries), Value::Array(values)) => {
                for (entry, v) in entries.iter().zip(values) {
                    entry.signal.assign_raw(v);
                }
                if entries.len() != values.len() {
                    let mut new_entries: Vec<ArrayEntry> =
                        entries.iter().take(values.len()).cloned().collect();
                    new_entries.extend(values.iter().skip(entries.len()).map(ArrayEntry::new));
                    self.set_node(DeepNode::Array(Rc::new(new_entries)));
                }
            }
            (DeepNode::Value(old), _) if !value.is_container() => {
                if old != *value {
                    self.set_node(DeepNode::Value(value.clone()));
                }
            }
            _ => self.replace(value),
        }
    }

    /// Returns `true` if both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}
impl From<&Value> for DeepSignal {
    fn from(value: &Value) -> Self {
        signalify(value)
    }
}
impl std::fmt::Debug for DeepSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeepSignal({})", self.unsignalify())
    }
}
