use std::{fmt, str::FromStr};

use crate::Value;


/// A location inside a nested value.
///
/// Parsed from dot-separated strings; `a.b.0`, `a.b[0]` and `a["b"][0]` name the same place.
/// A numeric segment addresses an array index when the container at that point is an array
/// and an ordinary key otherwise. The empty string is the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }
    pub fn parse(s: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                '.' => push_segment(&mut segments, &mut current),
                '[' => {
                    push_segment(&mut segments, &mut current);
                    for c in chars.by_ref() {
                        if c == ']' {
                            break;
                        }
                        current.push(c);
                    }
                    let key = current.trim().trim_matches(|c| c == '"' || c == '\'');
                    if !key.is_empty() {
                        segments.push(key.to_owned());
                    }
                    current.clear();
                }
                _ => current.push(c),
            }
        }
        push_segment(&mut segments, &mut current);
        Self(segments)
    }
    pub fn from_segments<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }
    pub fn parent(&self) -> Option<Path> {
        let (_, parent) = self.0.split_last()?;
        Some(Path(parent.to_vec()))
    }
    pub fn join(&self, segment: impl Into<String>) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Path(segments)
    }
    pub fn concat(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Path(segments)
    }

    /// Returns `true` if `self` is `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        segments.push(std::mem::take(current));
    }
}

/// Interprets a path segment as an array index.
pub fn segment_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}
impl FromStr for Path {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}
impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Path::parse(value)
    }
}
impl From<String> for Path {
    fn from(value: String) -> Self {
        Path::parse(&value)
    }
}
impl From<&String> for Path {
    fn from(value: &String) -> Self {
        Path::parse(value)
    }
}
impl From<&Path> for Path {
    fn from(value: &Path) -> Self {
        value.clone()
    }
}

/// Reads the value at `path`. Missing segments yield `None`.
pub fn get_value_at<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = current.child(segment)?;
    }
    Some(current)
}

/// Writes `value` at `path`, creating missing intermediate objects and arrays.
///
/// A numeric next segment creates an array, any other segment an object.
/// Leaf values standing in the way are replaced by the container the path needs.
pub fn set_value_at(root: &mut Value, path: &Path, value: Value) {
    let Some((last, init)) = path.segments().split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for (i, segment) in init.iter().enumerate() {
        let next = path.segments().get(i + 1).unwrap_or(last);
        let Some(child) = child_mut_or_create(current, segment, next) else {
            return;
        };
        current = child;
    }
    if let Some(slot) = slot_mut(current, last, None) {
        *slot = value;
    }
}

/// Removes the value at `path`. Array elements after the removed one shift down.
pub fn remove_value_at(root: &mut Value, path: &Path) -> Option<Value> {
    let (last, init) = path.segments().split_last()?;
    let mut current = root;
    for segment in init {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment_index(segment)?)?,
            _ => return None,
        };
    }
    match current {
        Value::Object(map) => map.shift_remove(last),
        Value::Array(items) => {
            let index = segment_index(last)?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

fn child_mut_or_create<'a>(
    current: &'a mut Value,
    segment: &str,
    next: &str,
) -> Option<&'a mut Value> {
    let empty = if segment_index(next).is_some() {
        Value::array()
    } else {
        Value::object()
    };
    let slot = slot_mut(current, segment, Some(&empty))?;
    if !slot.is_container() {
        *slot = empty;
    }
    Some(slot)
}

fn slot_mut<'a>(
    current: &'a mut Value,
    segment: &str,
    fill: Option<&Value>,
) -> Option<&'a mut Value> {
    if !current.is_container() {
        *current = if segment_index(segment).is_some() {
            Value::array()
        } else {
            Value::object()
        };
    }
    match current {
        Value::Object(map) => Some(
            map.entry(segment.to_owned())
                .or_insert_with(|| fill.cloned().unwrap_or_default()),
        ),
        Value::Array(items) => {
            let Some(index) = segment_index(segment) else {
                tracing::warn!("cannot address array element with non-numeric key `{segment}`");
                return None;
            };
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            Some(&mut items[index])
        }
        _ => None,
    }
}
