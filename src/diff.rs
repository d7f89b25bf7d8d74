use crate::{Path, Value};

#[cfg(test)]
mod tests;

/// Structural equality.
///
/// Dates compare by instant, numbers compare by value with `NaN` equal to itself,
/// and objects compare by key set regardless of key order.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Date(a), Value::Date(b)) => a.timestamp_millis() == b.timestamp_millis(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, a)| b.get(k).is_some_and(|b| deep_equal(a, b)))
        }
        _ => false,
    }
}

/// Like [`deep_equal`], but an object key missing on one side equals `Null` on the other.
///
/// Arrays still have to match in length, so removing an element is a difference.
pub fn equal_ignoring_missing(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.iter()
                .all(|(k, a)| equal_ignoring_missing(a, b.get(k).unwrap_or(&NULL)))
                && b.iter()
                    .filter(|(k, _)| !a.contains_key(*k))
                    .all(|(_, b)| b.is_null())
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equal_ignoring_missing(a, b))
        }
        _ => deep_equal(a, b),
    }
}

/// Paths of the leaves of `left` whose value differs from the same path in `right`.
///
/// Only paths present in `left` are reported; keys that exist solely in `right` are ignored.
/// An empty container on the left that differs from the right is reported as one path.
pub fn left_unequal_paths(left: &Value, right: &Value) -> Vec<Path> {
    let mut paths = Vec::new();
    collect_unequal(left, right, &Path::root(), &mut paths);
    paths
}

static NULL: Value = Value::Null;

fn collect_unequal(left: &Value, right: &Value, path: &Path, paths: &mut Vec<Path>) {
    let children: Vec<(String, &Value)> = match left {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };
    if children.is_empty() {
        if !deep_equal(left, right) {
            paths.push(path.clone());
        }
        return;
    }
    let same_kind = matches!(
        (left, right),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    );
    for (key, child) in children {
        let right_child = if same_kind {
            right.child(&key).unwrap_or(&NULL)
        } else {
            &NULL
        };
        collect_unequal(child, right_child, &path.join(key), paths);
    }
}
