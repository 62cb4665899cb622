//! Error enums for store fetches, decoding, merging and configuration.

use std::time::Duration;

use thiserror::Error;

use super::aggregate::StoreFailures;

/// Failure raised by a store while fetching its payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreFetchError {
    /// The store's backing location could not be reached.
    #[error("store '{store}' is unreachable: {source}")]
    Unreachable {
        /// Type of the store that failed.
        store: String,
        /// Underlying transport or I/O failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The fetch did not settle in time.
    #[error("store '{store}' timed out after {after:?}")]
    Timeout {
        /// Type of the store that failed.
        store: String,
        /// Time allowed before the fetch was abandoned.
        after: Duration,
    },

    /// The addressed resource does not exist.
    #[error("store '{store}' found nothing at '{location}'")]
    NotFound {
        /// Type of the store that failed.
        store: String,
        /// Path, URL or address that was looked up.
        location: String,
    },
}

/// Failure turning raw bytes into a [`crate::Document`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The payload is not valid for the declared format.
    #[error("invalid {format} payload: {message}")]
    Syntax {
        /// Format the payload was decoded as.
        format: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The payload cannot be represented by this decoder.
    #[error("format '{format}' cannot decode this payload: {message}")]
    UnsupportedFormat {
        /// Format that rejected the payload.
        format: String,
        /// Reason the payload was rejected.
        message: String,
    },
}

/// Failure combining documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MergeError {
    /// A document handed to the merge engine is not an object.
    #[error("document at position {position} has a {found} root; only objects can be merged")]
    NonObjectRoot {
        /// Position of the offending document in the merged sequence.
        position: usize,
        /// Kind of value found at the root.
        found: &'static str,
    },
}

/// Misconfiguration detected while building a retriever or a registry entry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// No factory is registered for the store type.
    #[error("unknown store type '{store_type}'")]
    UnknownStoreType {
        /// Requested store type.
        store_type: String,
    },

    /// No decoder is registered for the format.
    #[error("unknown configuration format '{format}'")]
    UnknownFormat {
        /// Requested format name.
        format: String,
    },

    /// A store or format option is missing or malformed.
    #[error("invalid configuration for '{store_type}': {message}")]
    InvalidSpec {
        /// Store type or format the options belong to.
        store_type: String,
        /// Description of the problem.
        message: String,
    },

    /// Retriever options could not be read.
    #[error("invalid retriever options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },

    /// The retriever was started outside a Tokio runtime.
    #[error("a Tokio runtime is required to start the retriever")]
    MissingRuntime,
}

/// Errors surfaced by the configuration relay.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelayError {
    /// A store could not produce its payload.
    #[error(transparent)]
    Fetch(#[from] StoreFetchError),

    /// A store payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A store produced a document the merge engine rejects.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The retriever or one of its stores is misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No store succeeded during the initial retrieval cycle.
    #[error("no configuration store succeeded during initialization:\n{0}")]
    Initialization(Box<StoreFailures>),

    /// The retriever has been closed.
    #[error("the configuration retriever is closed")]
    Closed,
}
