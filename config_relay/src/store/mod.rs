//! Store capabilities and the registry of store factories.
//!
//! A store is one configured source of configuration. The retriever never
//! reads files or sockets itself: it resolves each declared store type to a
//! [`StoreFactory`], asks it for a [`ConfigStore`], and calls
//! [`ConfigStore::fetch`] once per cycle.

mod directory;
mod env;
mod event_bus;
mod file;
mod fs;
#[cfg(feature = "http")]
mod http;
mod json;
mod pattern;
pub mod system_properties;
mod sys;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::format::FormatRegistry;
use crate::{ConfigurationError, Document, RelayResult, RelayResultExt, StoreSpec};

pub use directory::DirectoryStoreFactory;
pub use env::{EnvStore, EnvStoreFactory};
pub use event_bus::{EventBusStoreFactory, MessageBus};
pub use file::FileStoreFactory;
#[cfg(feature = "http")]
pub use http::HttpStoreFactory;
pub use json::JsonStoreFactory;
pub use pattern::AntPattern;
pub use sys::SysStoreFactory;

/// What a store hands back from a fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum StorePayload {
    /// Undecoded bytes, decoded with the store's declared format.
    Raw(Vec<u8>),
    /// A document the store already decoded.
    Document(Document),
}

/// A configured, independently fetchable configuration source.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the store's current payload.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreFetchError`] (or any other relay error) when
    /// the source cannot be read.
    async fn fetch(&self) -> RelayResult<StorePayload>;

    /// Release resources held by the store. Called once when the retriever
    /// closes.
    async fn close(&self) {}
}

/// Everything a factory may consult when creating a store.
#[derive(Clone, Copy, Debug)]
pub struct StoreContext<'a> {
    spec: &'a StoreSpec,
    formats: &'a FormatRegistry,
}

impl<'a> StoreContext<'a> {
    /// Bundle a store declaration with the format registry in use.
    #[must_use]
    pub const fn new(spec: &'a StoreSpec, formats: &'a FormatRegistry) -> Self {
        Self { spec, formats }
    }

    /// The store declaration.
    #[must_use]
    pub const fn spec(&self) -> &'a StoreSpec {
        self.spec
    }

    /// The store's `config` object.
    #[must_use]
    pub const fn config(&self) -> &'a Document {
        &self.spec.config
    }

    /// Formats available to stores that decode payloads themselves.
    #[must_use]
    pub const fn formats(&self) -> &'a FormatRegistry {
        self.formats
    }

    /// Read a required string option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSpec`] when the option is missing
    /// or not a string.
    pub fn required_str(&self, key: &str) -> RelayResult<&'a str> {
        self.config()
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ConfigurationError::invalid(
                    &self.spec.store_type,
                    format!("the '{key}' option is required"),
                )
            })
            .into_relay()
    }

    /// Read an optional boolean option, falling back to `default`.
    #[must_use]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.config()
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Build an invalid-spec error attributed to this store.
    #[must_use]
    pub fn invalid(&self, message: impl Into<String>) -> Arc<crate::RelayError> {
        ConfigurationError::invalid_arc(&self.spec.store_type, message)
    }
}

/// Creates stores of one type from their declarations.
pub trait StoreFactory: Send + Sync {
    /// Validate the declaration and build the store.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when the declaration is invalid.
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>>;
}

impl<F> StoreFactory for F
where
    F: Fn(&StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> + Send + Sync,
{
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        self(context)
    }
}

/// Type-to-factory mapping shared between a retriever and its builder.
#[derive(Clone)]
pub struct StoreRegistry {
    factories: Arc<RwLock<HashMap<String, Arc<dyn StoreFactory>>>>,
}

impl StoreRegistry {
    /// Create a registry with no factories.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a registry holding every built-in store type.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register("file", FileStoreFactory);
        registry.register("json", JsonStoreFactory);
        registry.register("env", EnvStoreFactory);
        registry.register("sys", SysStoreFactory);
        registry.register("directory", DirectoryStoreFactory);
        registry.register("event-bus", EventBusStoreFactory::new(MessageBus::global()));
        #[cfg(feature = "http")]
        registry.register("http", HttpStoreFactory);
        registry
    }

    /// Register `factory` under `store_type`, replacing any previous entry.
    pub fn register(&self, store_type: impl Into<String>, factory: impl StoreFactory + 'static) {
        let store_type = store_type.into();
        tracing::debug!(store_type = %store_type, "registering store factory");
        self.factories.write().insert(store_type, Arc::new(factory));
    }

    /// Resolve the factory registered under `store_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownStoreType`] when nothing is
    /// registered under `store_type`.
    pub fn lookup(&self, store_type: &str) -> RelayResult<Arc<dyn StoreFactory>> {
        self.factories
            .read()
            .get(store_type)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownStoreType {
                store_type: store_type.to_owned(),
            })
            .into_relay()
    }

    /// Whether a factory is registered under `store_type`.
    #[must_use]
    pub fn contains(&self, store_type: &str) -> bool {
        self.factories.read().contains_key(store_type)
    }

    /// Build the store declared by `spec`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown types or invalid options.
    pub fn create(
        &self,
        spec: &StoreSpec,
        formats: &FormatRegistry,
    ) -> RelayResult<Box<dyn ConfigStore>> {
        let factory = self.lookup(&spec.store_type)?;
        factory.create(&StoreContext::new(spec, formats))
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("StoreRegistry")
            .field("store_types", &names)
            .finish()
    }
}
