//! The document model shared by stores, decoders and the merge engine.
//!
//! A [`Document`] is a [`serde_json::Value`] whose objects keep insertion
//! order (the workspace enables `serde_json/preserve_order`). Equality is
//! structural and ignores key order. Published documents are wrapped in
//! [`std::sync::Arc`] and never mutated again.

mod diff;
mod merge;

pub use diff::{ChangeKind, PathChange, diff};
pub use merge::{merge, overlay, overlay_in_place};

use serde_json::{Map, Number, Value};

/// Structured configuration value.
pub type Document = Value;

/// Returns an empty object document.
#[must_use]
pub fn empty() -> Document {
    Value::Object(Map::new())
}

/// Name of the JSON kind held by `value`, used in diagnostics.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How flat `key = value` entries are turned into a document.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EntryOptions {
    /// Keep every value as a string instead of inferring booleans and numbers.
    pub raw: bool,
    /// Nest keys on `.` so `a.b = 1` becomes `{"a": {"b": 1}}`.
    pub hierarchical: bool,
}

impl EntryOptions {
    /// Read `raw-data` and `hierarchical` flags from store or format options.
    #[must_use]
    pub fn from_options(options: &Document) -> Self {
        let flag = |name: &str| options.get(name).and_then(Value::as_bool).unwrap_or(false);
        Self {
            raw: flag("raw-data"),
            hierarchical: flag("hierarchical"),
        }
    }
}

/// Build an object document from flat string entries.
///
/// Later entries win when keys collide.
///
/// # Examples
///
/// ```rust
/// use config_relay::document::{from_entries, EntryOptions};
/// use serde_json::json;
///
/// let doc = from_entries(
///     [("db.port", "5432"), ("db.tls", "true"), ("name", "svc")],
///     EntryOptions { raw: false, hierarchical: true },
/// );
/// assert_eq!(doc, json!({"db": {"port": 5432, "tls": true}, "name": "svc"}));
/// ```
pub fn from_entries<I, K, V>(entries: I, options: EntryOptions) -> Document
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut doc = empty();
    for (key, value) in entries {
        let key = key.as_ref();
        let value = if options.raw {
            Value::String(value.as_ref().to_owned())
        } else {
            infer_scalar(value.as_ref())
        };
        let nested = if options.hierarchical {
            nest(key, value)
        } else {
            single(key.to_owned(), value)
        };
        overlay_in_place(&mut doc, nested);
    }
    doc
}

/// Interpret `raw` as a boolean or number when it reads as one.
#[must_use]
pub fn infer_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    raw.parse::<f64>()
        .ok()
        .filter(|_| raw.chars().any(|c| c.is_ascii_digit()))
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(raw.to_owned()), Value::Number)
}

fn nest(key: &str, value: Value) -> Value {
    if key.split('.').any(str::is_empty) {
        return single(key.to_owned(), value);
    }
    key.rsplit('.')
        .fold(value, |inner, segment| single(segment.to_owned(), inner))
}

fn single(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}

#[cfg(test)]
mod tests;
