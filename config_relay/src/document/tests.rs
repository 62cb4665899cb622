//! Unit tests for overlay, merge and diff behaviour.

use proptest::prelude::*;
use rstest::rstest;
use serde_json::{Map, Value, json};

use super::{ChangeKind, EntryOptions, diff, from_entries, infer_scalar, merge, overlay};
use crate::MergeError;

#[rstest]
#[case::declared_order(
    json!({"a": "v", "b": 1}),
    json!({"a": "v2", "c": 2}),
    json!({"a": "v2", "b": 1, "c": 2})
)]
#[case::reversed_order(
    json!({"a": "v2", "c": 2}),
    json!({"a": "v", "b": 1}),
    json!({"a": "v", "b": 1, "c": 2})
)]
fn last_declared_document_wins(#[case] first: Value, #[case] second: Value, #[case] expected: Value) {
    let merged = merge([first, second]).expect("objects merge");
    assert_eq!(merged, expected);
}

#[rstest]
#[case::nested_objects_recurse(
    json!({"db": {"host": "a", "port": 1}}),
    json!({"db": {"host": "b"}}),
    json!({"db": {"host": "b", "port": 1}})
)]
#[case::arrays_replace_wholesale(
    json!({"hosts": ["a", "b", "c"]}),
    json!({"hosts": ["z"]}),
    json!({"hosts": ["z"]})
)]
#[case::scalar_replaces_object(
    json!({"db": {"host": "a"}}),
    json!({"db": "sqlite://"}),
    json!({"db": "sqlite://"})
)]
#[case::object_replaces_scalar(
    json!({"db": "sqlite://"}),
    json!({"db": {"host": "a"}}),
    json!({"db": {"host": "a"}})
)]
#[case::null_overrides(json!({"a": 1}), json!({"a": null}), json!({"a": null}))]
fn overlay_rules(#[case] base: Value, #[case] incoming: Value, #[case] expected: Value) {
    assert_eq!(overlay(base, incoming), expected);
}

#[rstest]
#[case(
    json!({"a": 1, "n": {"x": 1, "y": [1]}}),
    json!({"b": 2, "n": {"y": [2], "z": {"deep": true}}}),
    json!({"a": 3, "n": {"z": {"deep": false, "other": 1}}})
)]
#[case(json!({}), json!({"k": {"v": 1}}), json!({"k": 5}))]
#[case(json!({"k": [1, 2]}), json!({}), json!({"k": {"now": "object"}}))]
#[case(json!({"x": "1"}), json!({"x": {"y": "2"}}), json!({"x": {"y": {"z": "3"}}}))]
fn merge_is_associative(#[case] a: Value, #[case] b: Value, #[case] c: Value) {
    let all_at_once = merge([a.clone(), b.clone(), c.clone()]).expect("merge");
    let left_first = merge([merge([a, b]).expect("merge"), c]).expect("merge");
    assert_eq!(all_at_once, left_first);
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,4}".prop_map(Value::from),
        prop::collection::vec(any::<i32>().prop_map(Value::from), 0..3).prop_map(Value::Array),
    ]
}

fn object_of(values: impl Strategy<Value = Value>) -> impl Strategy<Value = Value> {
    // A narrow key space makes overlapping keys the common case.
    prop::collection::vec(("[a-d]", values), 0..4)
        .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>()))
}

fn nested_document() -> impl Strategy<Value = Value> {
    let value = leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![leaf(), object_of(inner)]
    });
    object_of(value)
}

proptest! {
    #[test]
    fn merge_is_associative_for_nested_objects(
        a in nested_document(),
        b in nested_document(),
        c in nested_document(),
    ) {
        let all_at_once = merge([a.clone(), b.clone(), c.clone()]).expect("merge");
        let left_first = merge([merge([a, b]).expect("merge"), c]).expect("merge");
        prop_assert_eq!(all_at_once, left_first);
    }
}

#[test]
fn merge_is_not_commutative() {
    let a = json!({"k": "a"});
    let b = json!({"k": "b"});
    assert_ne!(
        merge([a.clone(), b.clone()]).expect("merge"),
        merge([b, a]).expect("merge")
    );
}

#[test]
fn merge_of_nothing_is_an_empty_object() {
    assert_eq!(merge(Vec::new()).expect("merge"), json!({}));
}

#[rstest]
#[case(json!([1, 2]), "array")]
#[case(json!("text"), "string")]
#[case(json!(null), "null")]
fn merge_rejects_non_object_roots(#[case] root: Value, #[case] kind: &'static str) {
    let err = merge([json!({"a": 1}), root]).expect_err("non-object root");
    assert_eq!(
        err,
        MergeError::NonObjectRoot {
            position: 1,
            found: kind,
        }
    );
}

#[test]
fn key_order_does_not_affect_equality() {
    assert_eq!(json!({"a": 1, "b": 2}), json!({"b": 2, "a": 1}));
}

#[test]
fn merged_objects_keep_first_insertion_order() {
    let merged = merge([json!({"z": 1, "a": 1}), json!({"m": 2, "z": 3})]).expect("merge");
    let keys: Vec<&str> = merged
        .as_object()
        .expect("object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, ["z", "a", "m"]);
}

#[test]
fn diff_reports_nested_changes() {
    let changes = diff(
        &json!({"db": {"host": "a"}, "list": [1]}),
        &json!({"db": {"host": "a", "port": 1}, "list": [2]}),
    );
    let summary: Vec<(&str, ChangeKind)> =
        changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
    assert_eq!(
        summary,
        [("db.port", ChangeKind::Added), ("list", ChangeKind::Modified)]
    );
}

#[test]
fn diff_of_equal_documents_is_empty() {
    let doc = json!({"a": {"b": [1, 2, {"c": null}]}});
    assert!(diff(&doc, &doc.clone()).is_empty());
}

#[rstest]
#[case("true", json!(true))]
#[case("false", json!(false))]
#[case("42", json!(42))]
#[case("-7", json!(-7))]
#[case("2.5", json!(2.5))]
#[case("NaN", json!("NaN"))]
#[case("inf", json!("inf"))]
#[case("hello", json!("hello"))]
#[case("", json!(""))]
fn scalars_are_inferred(#[case] raw: &str, #[case] expected: Value) {
    assert_eq!(infer_scalar(raw), expected);
}

#[test]
fn flat_entries_stay_flat_by_default() {
    let doc = from_entries([("a.b", "1"), ("flag", "true")], EntryOptions::default());
    assert_eq!(doc, json!({"a.b": 1, "flag": true}));
}

#[test]
fn raw_entries_keep_strings() {
    let options = EntryOptions {
        raw: true,
        hierarchical: false,
    };
    let doc = from_entries([("port", "8080")], options);
    assert_eq!(doc, json!({"port": "8080"}));
}

#[test]
fn hierarchical_entries_nest_and_skip_malformed_paths() {
    let options = EntryOptions {
        raw: false,
        hierarchical: true,
    };
    let doc = from_entries([("a.b", "1"), ("a.c", "x"), (".hidden", "y")], options);
    assert_eq!(doc, json!({"a": {"b": 1, "c": "x"}, ".hidden": "y"}));
}

#[test]
fn entry_options_read_store_flags() {
    let options = EntryOptions::from_options(&json!({"raw-data": true, "hierarchical": "yes"}));
    assert!(options.raw);
    assert!(!options.hierarchical);
}
