//! Process-wide property table backing the `sys` store.
//!
//! The table starts with a few facts about the running process and is
//! otherwise populated by the application through [`set`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use parking_lot::RwLock;

static PROPERTIES: LazyLock<RwLock<BTreeMap<String, String>>> =
    LazyLock::new(|| RwLock::new(seed()));

fn seed() -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    props.insert("os.name".to_owned(), std::env::consts::OS.to_owned());
    props.insert("os.arch".to_owned(), std::env::consts::ARCH.to_owned());
    props.insert("os.family".to_owned(), std::env::consts::FAMILY.to_owned());
    props.insert("process.id".to_owned(), std::process::id().to_string());
    if let Ok(dir) = std::env::current_dir() {
        props.insert("user.dir".to_owned(), dir.to_string_lossy().into_owned());
    }
    props
}

/// Set `key` to `value`, returning the previous value.
pub fn set(key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    PROPERTIES.write().insert(key.into(), value.into())
}

/// Remove `key`, returning its value.
pub fn remove(key: &str) -> Option<String> {
    PROPERTIES.write().remove(key)
}

/// Current value of `key`.
#[must_use]
pub fn property(key: &str) -> Option<String> {
    PROPERTIES.read().get(key).cloned()
}

/// Copy of every property, sorted by key.
#[must_use]
pub fn properties() -> BTreeMap<String, String> {
    PROPERTIES.read().clone()
}

#[cfg(test)]
mod tests {
    use super::{properties, property, remove, set};

    #[test]
    fn seeded_with_platform_facts() {
        assert_eq!(property("os.name").as_deref(), Some(std::env::consts::OS));
        assert!(properties().contains_key("process.id"));
    }

    #[test]
    fn set_and_remove_round_trip() {
        let key = "system_properties.tests.set_and_remove";
        assert_eq!(set(key, "one"), None);
        assert_eq!(set(key, "two").as_deref(), Some("one"));
        assert_eq!(remove(key).as_deref(), Some("two"));
        assert_eq!(property(key), None);
    }
}
