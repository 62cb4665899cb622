//! Overlay mechanics for configuration documents.

use serde_json::{Map, Value};

use crate::MergeError;

use super::{Document, kind_of};

/// Merge `docs` left to right over an empty object.
///
/// Later documents win on conflicting keys. Every document must have an
/// object root; the first one that does not aborts the merge with
/// [`MergeError::NonObjectRoot`].
///
/// # Errors
///
/// Returns [`MergeError::NonObjectRoot`] when an input is not an object.
///
/// # Examples
///
/// ```rust
/// use config_relay::document::merge;
/// use serde_json::json;
///
/// let merged = merge([json!({"a": "v", "b": 1}), json!({"a": "v2", "c": 2})])?;
/// assert_eq!(merged, json!({"a": "v2", "b": 1, "c": 2}));
/// # Ok::<_, config_relay::MergeError>(())
/// ```
pub fn merge<I>(docs: I) -> Result<Document, MergeError>
where
    I: IntoIterator<Item = Document>,
{
    let mut acc = Value::Object(Map::new());
    for (position, doc) in docs.into_iter().enumerate() {
        if !doc.is_object() {
            return Err(MergeError::NonObjectRoot {
                position,
                found: kind_of(&doc),
            });
        }
        overlay_in_place(&mut acc, doc);
    }
    Ok(acc)
}

/// Overlay `incoming` onto `base`, returning the combined document.
///
/// See [`overlay_in_place`] for the rules.
#[must_use]
pub fn overlay(mut base: Document, incoming: Document) -> Document {
    overlay_in_place(&mut base, incoming);
    base
}

/// Overlay `incoming` onto `target`, updating `target` in place.
///
/// Behaviour:
/// - Objects are merged recursively (keys are added or overwritten, and nested
///   objects are overlaid).
/// - Arrays and scalars replace `target` wholesale (no deep merge for arrays).
/// - An object arriving over a non-object replaces it as well.
///
/// # Examples
///
/// ```rust
/// use config_relay::document::overlay_in_place;
/// use serde_json::json;
///
/// let mut acc = json!({"a": 1, "b": {"x": 1}});
/// overlay_in_place(&mut acc, json!({"b": {"y": 2}, "c": 3}));
/// assert_eq!(acc, json!({"a": 1, "b": {"x": 1, "y": 2}, "c": 3}));
///
/// overlay_in_place(&mut acc, json!({"b": [1, 2, 3]}));
/// assert_eq!(acc["b"], json!([1, 2, 3]));
/// ```
pub fn overlay_in_place(target: &mut Document, incoming: Document) {
    match incoming {
        Value::Object(map) => overlay_object(target, map),
        other => *target = other,
    }
}

fn overlay_object(target: &mut Value, map: Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    let Some(target_map) = target.as_object_mut() else {
        return;
    };

    for (key, value) in map {
        match target_map.get_mut(&key) {
            Some(existing) => overlay_in_place(existing, value),
            None => {
                target_map.insert(key, value);
            }
        }
    }
}
