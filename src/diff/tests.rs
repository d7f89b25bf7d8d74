use chrono::{TimeZone, Utc};
use rstest::rstest;

use crate::{deep_equal, equal_ignoring_missing, left_unequal_paths, Path, Value};

fn json(v: serde_json::Value) -> Value {
    v.into()
}

#[rstest]
#[case(serde_json::json!(null), serde_json::json!(null), true)]
#[case(serde_json::json!(1), serde_json::json!(1.0), true)]
#[case(serde_json::json!(1), serde_json::json!("1"), false)]
#[case(serde_json::json!([1, 2]), serde_json::json!([1, 2]), true)]
#[case(serde_json::json!([1, 2]), serde_json::json!([2, 1]), false)]
#[case(serde_json::json!({"a": 1, "b": 2}), serde_json::json!({"b": 2, "a": 1}), true)]
#[case(serde_json::json!({"a": 1}), serde_json::json!({"a": 1, "b": null}), false)]
#[case(serde_json::json!({}), serde_json::json!([]), false)]
fn equality(#[case] a: serde_json::Value, #[case] b: serde_json::Value, #[case] expected: bool) {
    assert_eq!(deep_equal(&json(a), &json(b)), expected);
}

#[rstest]
#[case(serde_json::json!({"a": 1}), serde_json::json!({"a": 1, "b": null}), true)]
#[case(serde_json::json!({}), serde_json::json!({"b": null}), true)]
#[case(serde_json::json!({"a": 1}), serde_json::json!({"a": 1, "b": 2}), false)]
#[case(serde_json::json!({"a": 1, "b": 2}), serde_json::json!({"a": 1}), false)]
#[case(serde_json::json!({"items": [1]}), serde_json::json!({"items": [1, 2]}), false)]
#[case(serde_json::json!({"items": [1, null]}), serde_json::json!({"items": [1]}), false)]
fn equality_ignoring_missing_keys(
    #[case] a: serde_json::Value,
    #[case] b: serde_json::Value,
    #[case] expected: bool,
) {
    assert_eq!(equal_ignoring_missing(&json(a), &json(b)), expected);
}

#[test]
fn nan_equals_nan() {
    assert!(deep_equal(
        &Value::Number(f64::NAN),
        &Value::Number(f64::NAN)
    ));
}

#[test]
fn dates_compare_by_instant() {
    let a = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let b = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
    assert!(deep_equal(&a.into(), &a.into()));
    assert!(!deep_equal(&a.into(), &b.into()));
    assert!(!deep_equal(&a.into(), &Value::from(a.to_rfc3339())));
}

fn paths(left: serde_json::Value, right: serde_json::Value) -> Vec<String> {
    left_unequal_paths(&json(left), &json(right))
        .iter()
        .map(Path::to_string)
        .collect()
}

#[test]
fn unequal_leaves() {
    assert_eq!(
        paths(
            serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}}),
            serde_json::json!({"a": 1, "b": {"c": 5, "d": 3}})
        ),
        ["b.c"]
    );
}

#[test]
fn keys_only_on_the_right_are_ignored() {
    assert_eq!(
        paths(serde_json::json!({"a": 1}), serde_json::json!({"a": 1, "b": 2})),
        Vec::<String>::new()
    );
}

#[test]
fn missing_on_the_right_reports_every_leaf() {
    assert_eq!(
        paths(serde_json::json!({"a": {"x": 1, "y": [1]}}), serde_json::json!({})),
        ["a.x", "a.y.0"]
    );
}

#[test]
fn longer_array_on_the_left() {
    assert_eq!(
        paths(serde_json::json!([1, 2, 3]), serde_json::json!([1, 2])),
        ["2"]
    );
}

#[test]
fn empty_container_is_one_path() {
    assert_eq!(
        paths(serde_json::json!({"a": []}), serde_json::json!({"a": [1]})),
        ["a"]
    );
    assert_eq!(
        paths(serde_json::json!({"a": []}), serde_json::json!({"a": []})),
        Vec::<String>::new()
    );
}

#[test]
fn equal_values_have_no_paths() {
    let v = serde_json::json!({"a": [1, {"b": null}]});
    assert!(paths(v.clone(), v).is_empty());
}
