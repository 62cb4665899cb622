//! Helpers for mutating environment variables in tests.
//!
//! Every mutation takes a global re-entrant lock and returns a guard that
//! restores the previous value (or removes the variable) when dropped.
//! Guards for the same key restore in LIFO order.
//!
//! # Examples
//!
//! ```
//! use config_relay_test_helpers::env;
//!
//! let _guard = env::set_var("CONFIG_RELAY_DOC_KEY", "1");
//! assert_eq!(std::env::var("CONFIG_RELAY_DOC_KEY").as_deref(), Ok("1"));
//! ```

use std::ffi::{OsStr, OsString};
use std::sync::LazyLock;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

static ENV_LOCK: LazyLock<ReentrantMutex<()>> = LazyLock::new(ReentrantMutex::default);

/// Restores one environment variable on drop.
#[must_use = "dropping restores the prior value"]
pub struct EnvVarGuard {
    key: String,
    original: Option<OsString>,
}

/// Holds the environment lock so several mutations happen as one unit.
#[must_use = "dropping releases the environment lock"]
pub struct EnvLock {
    _guard: ReentrantMutexGuard<'static, ()>,
}

/// Take the environment lock until the returned value is dropped.
pub fn lock() -> EnvLock {
    EnvLock {
        _guard: ENV_LOCK.lock(),
    }
}

fn mutate(key: String, apply: impl FnOnce(&str)) -> EnvVarGuard {
    let _guard = ENV_LOCK.lock();
    let original = std::env::var_os(&key);
    apply(&key);
    EnvVarGuard { key, original }
}

/// Set `key` to `value` until the guard drops.
pub fn set_var(key: impl Into<String>, value: impl AsRef<OsStr>) -> EnvVarGuard {
    // SAFETY: mutations are serialised through `ENV_LOCK`.
    mutate(key.into(), |k| unsafe { std::env::set_var(k, value.as_ref()) })
}

/// Remove `key` until the guard drops.
pub fn remove_var(key: impl Into<String>) -> EnvVarGuard {
    // SAFETY: mutations are serialised through `ENV_LOCK`.
    mutate(key.into(), |k| unsafe { std::env::remove_var(k) })
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let _guard = ENV_LOCK.lock();
        match self.original.take() {
            // SAFETY: mutations are serialised through `ENV_LOCK`.
            Some(value) => unsafe { std::env::set_var(&self.key, value) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}
