//! Store exposing environment variables as a flat object.

use async_trait::async_trait;
use figment::providers::Env;
use serde_json::Value;

use crate::document::{self, EntryOptions};
use crate::{Document, RelayResult};

use super::{ConfigStore, StoreContext, StoreFactory, StorePayload};

/// Factory for the `env` store.
///
/// Options: `keys` (array of variable names to keep), `raw-data` and
/// `hierarchical`. The declared format is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvStoreFactory;

impl StoreFactory for EnvStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        let keys = match context.config().get("keys") {
            None => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_owned)
                            .ok_or_else(|| context.invalid("'keys' must be an array of strings"))
                    })
                    .collect::<RelayResult<Vec<_>>>()?,
            ),
            Some(_) => return Err(context.invalid("'keys' must be an array of strings")),
        };
        Ok(Box::new(EnvStore {
            keys,
            options: EntryOptions::from_options(context.config()),
        }))
    }
}

/// Reads the process environment on every fetch.
#[derive(Clone, Debug, Default)]
pub struct EnvStore {
    keys: Option<Vec<String>>,
    options: EntryOptions,
}

impl EnvStore {
    /// Create a store reading every variable with the given options.
    #[must_use]
    pub const fn new(options: EntryOptions) -> Self {
        Self {
            keys: None,
            options,
        }
    }

    /// Restrict the store to the named variables (matched case-insensitively).
    #[must_use]
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Capture the current environment as a document.
    #[must_use]
    pub fn snapshot(&self) -> Document {
        let mut env = Env::raw();
        if let Some(keys) = &self.keys {
            let names: Vec<&str> = keys.iter().map(String::as_str).collect();
            env = env.only(&names);
        }
        // Chaining `only` re-enables lowercasing, so this must come last.
        env = env.lowercase(false);
        let mut entries: Vec<(String, String)> = env
            .iter()
            .map(|(key, value)| (key.as_str().to_owned(), value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        document::from_entries(entries, self.options)
    }
}

#[async_trait]
impl ConfigStore for EnvStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        Ok(StorePayload::Document(self.snapshot()))
    }
}
