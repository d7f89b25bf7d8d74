use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    batch,
    path::{segment_index, Path},
    SignalContext, Value,
};

use super::{next_array_key, signalify, ArrayEntry, DeepNode, DeepSignal};

fn child_of(node: &DeepNode, segment: &str) -> Option<DeepSignal> {
    match node {
        DeepNode::Object(map) => map.get(segment).cloned(),
        DeepNode::Array(entries) => Some(entries.get(segment_index(segment)?)?.signal.clone()),
        DeepNode::Value(_) => None,
    }
}

fn empty_node_for(segment: &str) -> DeepNode {
    if segment_index(segment).is_some() {
        DeepNode::Array(Rc::new(Vec::new()))
    } else {
        DeepNode::Object(Rc::new(IndexMap::new()))
    }
}

/// Returns the container at `path`, or `None` if any segment is missing.
pub fn get_at(root: &DeepSignal, path: &Path) -> Option<DeepSignal> {
    let mut current = root.clone();
    for segment in path.segments() {
        current = child_of(&current.node(), segment)?;
    }
    Some(current)
}

/// Same as [`get_at`], but subscribes to every container on the way.
///
/// The caller is notified when the container at `path` is replaced or removed,
/// not when its content changes.
pub fn get_at_tracked(root: &DeepSignal, path: &Path, sc: &mut SignalContext) -> Option<DeepSignal> {
    let mut current = root.clone();
    for segment in path.segments() {
        current = child_of(&current.node_tracked(sc), segment)?;
    }
    Some(current)
}

/// Reads the plain value at `path`, subscribing to the path and everything below it.
pub fn value_at_tracked(root: &DeepSignal, path: &Path, sc: &mut SignalContext) -> Value {
    match get_at_tracked(root, path, sc) {
        Some(signal) => signal.get(sc),
        None => Value::Null,
    }
}

/// Inserts a freshly signalified `value` at `path` and returns its container.
///
/// Missing intermediate containers are created: an array when the next segment is numeric,
/// an object otherwise. A leaf standing in the way is turned into the container the path needs.
pub fn set_at(root: &DeepSignal, path: &Path, value: &Value) -> DeepSignal {
    let Some((last, init)) = path.segments().split_last() else {
        root.replace(value);
        return root.clone();
    };
    batch(|| {
        let mut parent = root.clone();
        for (i, segment) in init.iter().enumerate() {
            let next = &path.segments()[i + 1];
            parent = match child_of(&parent.node(), segment) {
                Some(child) => {
                    if matches!(child.node(), DeepNode::Value(_)) {
                        child.set_node(empty_node_for(next));
                    }
                    child
                }
                None => {
                    let child = DeepSignal(crate::State::new(empty_node_for(next)));
                    insert_child(&parent, segment, child.clone());
                    child
                }
            };
        }
        let child = signalify(value);
        insert_child(&parent, last, child.clone());
        child
    })
}

/// Writes `value` at `path` through the existing container, or inserts it with [`set_at`].
pub fn write_at(root: &DeepSignal, path: &Path, value: &Value) -> DeepSignal {
    match get_at(root, path) {
        Some(signal) => {
            signal.assign(value);
            signal
        }
        None => set_at(root, path, value),
    }
}

/// Removes the container at `path` from its parent and returns it.
///
/// Removing an array element shifts the later elements down; their keys are kept.
pub fn remove_at(root: &DeepSignal, path: &Path) -> Option<DeepSignal> {
    let parent = get_at(root, &path.parent()?)?;
    let last = path.last()?;
    match parent.node() {
        DeepNode::Object(map) => {
            let mut map = (*map).clone();
            let removed = map.shift_remove(last)?;
            parent.set_node(DeepNode::Object(Rc::new(map)));
            Some(removed)
        }
        DeepNode::Array(entries) => {
            let index = segment_index(last)?;
            if index >= entries.len() {
                return None;
            }
            let mut entries = (*entries).clone();
            let removed = entries.remove(index);
            parent.set_node(DeepNode::Array(Rc::new(entries)));
            Some(removed.signal)
        }
        DeepNode::Value(_) => None,
    }
}

fn insert_child(parent: &DeepSignal, segment: &str, child: DeepSignal) {
    let node = match parent.node() {
        DeepNode::Value(_) => empty_node_for(segment),
        node => node,
    };
    match node {
        DeepNode::Object(map) => {
            let mut map = (*map).clone();
            map.insert(segment.to_owned(), child);
            parent.set_node(DeepNode::Object(Rc::new(map)));
        }
        DeepNode::Array(entries) => {
            let Some(index) = segment_index(segment) else {
                tracing::warn!("cannot set array element with non-numeric key `{segment}`");
                return;
            };
            let mut entries = (*entries).clone();
            put_entry(
                &mut entries,
                index,
                ArrayEntry {
                    key: next_array_key(),
                    signal: child,
                },
            );
            parent.set_node(DeepNode::Array(Rc::new(entries)));
        }
        DeepNode::Value(_) => unreachable!(),
    }
}

fn put_entry(entries: &mut Vec<ArrayEntry>, index: usize, entry: ArrayEntry) {
    if index < entries.len() {
        entries[index] = entry;
    } else {
        while entries.len() < index {
            entries.push(ArrayEntry::new(&Value::Null));
        }
        entries.push(entry);
    }
}

/// Array primitives.
///
/// Each operation replaces the array node as a whole, so listeners are notified once.
/// On a container that is not an array they do nothing and log a warning.
impl DeepSignal {
    fn modify_array(&self, op: &str, f: impl FnOnce(&mut Vec<ArrayEntry>) -> bool) {
        let DeepNode::Array(entries) = self.node() else {
            tracing::warn!("`{op}` called on a value that is not an array");
            return;
        };
        let mut entries = (*entries).clone();
        if f(&mut entries) {
            self.set_node(DeepNode::Array(Rc::new(entries)));
        }
    }

    /// Overwrites (or creates) the element at `index` with a new key. Later elements do not move.
    pub fn insert(&self, index: usize, value: &Value) {
        self.modify_array("insert", |entries| {
            put_entry(entries, index, ArrayEntry::new(value));
            true
        })
    }

    pub fn push(&self, value: &Value) {
        self.modify_array("push", |entries| {
            entries.push(ArrayEntry::new(value));
            true
        })
    }

    /// Inserts an element at `index`, shifting later elements right.
    ///
    /// An index past the end appends.
    pub fn push_at(&self, index: usize, value: &Value) {
        self.modify_array("push_at", |entries| {
            let index = index.min(entries.len());
            entries.insert(index, ArrayEntry::new(value));
            true
        })
    }

    /// Removes the element at `index`. Out of range indexes are ignored.
    pub fn remove(&self, index: usize) {
        self.modify_array("remove", |entries| {
            if index < entries.len() {
                entries.remove(index);
                true
            } else {
                false
            }
        })
    }

    /// Exchanges two elements. Keys move with their elements.
    pub fn swap(&self, i: usize, j: usize) {
        self.modify_array("swap", |entries| {
            if i == j || i >= entries.len() || j >= entries.len() {
                return false;
            }
            entries.swap(i, j);
            true
        })
    }

    /// Moves the element at `from` to `to`, shifting the elements in between.
    pub fn move_item(&self, from: usize, to: usize) {
        self.modify_array("move_item", |entries| {
            if from >= entries.len() {
                return false;
            }
            let to = to.min(entries.len() - 1);
            if from == to {
                return false;
            }
            let entry = entries.remove(from);
            entries.insert(to, entry);
            true
        })
    }

    pub fn len(&self) -> usize {
        match self.node() {
            DeepNode::Array(entries) => entries.len(),
            DeepNode::Object(map) => map.len(),
            DeepNode::Value(_) => 0,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
