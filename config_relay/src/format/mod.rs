//! Format decoders and the registry that resolves them by name.
//!
//! A decoder turns the raw bytes returned by a store into a [`Document`].
//! Decoders are registered explicitly under a format name; looking up an
//! unregistered name is a configuration error reported while the retriever is
//! being built, never halfway through a cycle.

mod json;
mod properties;
mod raw;
#[cfg(feature = "toml")]
mod toml;
#[cfg(feature = "yaml")]
mod yaml;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{ConfigurationError, DecodeError, Document, RelayResult, RelayResultExt};

#[cfg(feature = "json5")]
pub use json::Json5Decoder;
pub use json::JsonDecoder;
pub use properties::PropertiesDecoder;
pub use raw::RawDecoder;
#[cfg(feature = "toml")]
pub use self::toml::TomlDecoder;
#[cfg(feature = "yaml")]
pub use yaml::YamlDecoder;

/// Capability turning bytes into a [`Document`].
///
/// `options` is the `config` object of the store whose payload is decoded, so
/// decoders can honour per-store flags such as `raw-data`.
pub trait FormatDecoder: Send + Sync {
    /// Decode `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the payload is malformed.
    fn decode(&self, bytes: &[u8], options: &Document) -> Result<Document, DecodeError>;

    /// Check `options` once when a store using this format is configured.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when required options are missing.
    fn validate(&self, _options: &Document) -> Result<(), ConfigurationError> {
        Ok(())
    }
}

impl<F> FormatDecoder for F
where
    F: Fn(&[u8], &Document) -> Result<Document, DecodeError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8], options: &Document) -> Result<Document, DecodeError> {
        self(bytes, options)
    }
}

/// Name-to-decoder mapping shared between a retriever and its builder.
///
/// Cloning the registry yields another handle to the same table, so
/// registrations made through any handle are visible to every holder.
#[derive(Clone)]
pub struct FormatRegistry {
    decoders: Arc<RwLock<HashMap<String, Arc<dyn FormatDecoder>>>>,
}

impl FormatRegistry {
    /// Create a registry with no decoders.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a registry holding every built-in decoder enabled at compile
    /// time.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register("json", JsonDecoder);
        registry.register("properties", PropertiesDecoder);
        registry.register("raw", RawDecoder);
        #[cfg(feature = "toml")]
        registry.register("toml", TomlDecoder);
        #[cfg(feature = "yaml")]
        registry.register("yaml", YamlDecoder);
        #[cfg(feature = "json5")]
        registry.register("json5", Json5Decoder);
        registry
    }

    /// Register `decoder` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, decoder: impl FormatDecoder + 'static) {
        self.register_shared(name, Arc::new(decoder));
    }

    /// Register an already shared decoder under `name`.
    pub fn register_shared(&self, name: impl Into<String>, decoder: Arc<dyn FormatDecoder>) {
        let name = name.into();
        tracing::debug!(format = %name, "registering format decoder");
        self.decoders.write().insert(name, decoder);
    }

    /// Resolve the decoder registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownFormat`] when nothing is
    /// registered under `name`.
    pub fn lookup(&self, name: &str) -> RelayResult<Arc<dyn FormatDecoder>> {
        self.decoders
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFormat {
                format: name.to_owned(),
            })
            .into_relay()
    }

    /// Whether a decoder is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.decoders.read().contains_key(name)
    }

    /// Decode `bytes` with the decoder registered under `format`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown formats and a decode error
    /// for malformed payloads.
    pub fn decode(&self, format: &str, bytes: &[u8], options: &Document) -> RelayResult<Document> {
        self.lookup(format)?.decode(bytes, options).into_relay()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.decoders.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("FormatRegistry")
            .field("formats", &names)
            .finish()
    }
}

/// Decode `bytes` as UTF-8 text for text-based formats.
pub(crate) fn utf8<'a>(format: &str, bytes: &'a [u8]) -> Result<&'a str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|e| DecodeError::syntax(format, e))
}
