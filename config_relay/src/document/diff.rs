//! Structural comparison of two documents.

use serde_json::Value;

use super::Document;

/// How a key path differs between two documents.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    /// The path exists only in the newer document.
    Added,
    /// The path exists only in the older document.
    Removed,
    /// The path exists in both documents with different values.
    Modified,
}

/// A single differing key path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathChange {
    /// Dotted path of the key, for example `server.port`.
    pub path: String,
    /// Nature of the difference.
    pub kind: ChangeKind,
}

/// List the key paths that differ between `previous` and `current`.
///
/// Only objects are descended into; arrays and scalars compare as whole
/// values, matching the overlay rules. Paths are reported in the key order of
/// `previous`, followed by keys that only `current` holds.
///
/// # Examples
///
/// ```rust
/// use config_relay::document::{diff, ChangeKind};
/// use serde_json::json;
///
/// let changes = diff(
///     &json!({"db": {"host": "a", "port": 1}, "debug": true}),
///     &json!({"db": {"host": "b", "port": 1}, "name": "x"}),
/// );
/// let paths: Vec<_> = changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
/// assert_eq!(
///     paths,
///     [
///         ("db.host", ChangeKind::Modified),
///         ("debug", ChangeKind::Removed),
///         ("name", ChangeKind::Added),
///     ]
/// );
/// ```
#[must_use]
pub fn diff(previous: &Document, current: &Document) -> Vec<PathChange> {
    let mut changes = Vec::new();
    diff_into(&mut changes, String::new(), previous, current);
    changes
}

fn diff_into(changes: &mut Vec<PathChange>, prefix: String, previous: &Value, current: &Value) {
    let (Value::Object(old), Value::Object(new)) = (previous, current) else {
        if previous != current {
            changes.push(PathChange {
                path: prefix,
                kind: ChangeKind::Modified,
            });
        }
        return;
    };

    for (key, old_value) in old {
        let path = join(&prefix, key);
        match new.get(key) {
            Some(new_value) => diff_into(changes, path, old_value, new_value),
            None => changes.push(PathChange {
                path,
                kind: ChangeKind::Removed,
            }),
        }
    }
    for key in new.keys().filter(|key| !old.contains_key(*key)) {
        changes.push(PathChange {
            path: join(&prefix, key),
            kind: ChangeKind::Added,
        });
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
