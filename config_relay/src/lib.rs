//! Layered configuration retrieval with change notifications.
//!
//! A [`Retriever`] polls an ordered list of configuration stores, decodes
//! each payload into a [`Document`], overlays the documents so that later
//! stores win, and republishes the result. Consumers read the current
//! configuration with [`Retriever::get`] or [`Retriever::get_cached`] and
//! subscribe to changes with [`Retriever::listen`].
//!
//! Stores and formats are resolved through explicit registries
//! ([`StoreRegistry`], [`FormatRegistry`]); the built-in ones cover files,
//! directories, environment variables, process properties, HTTP and an
//! in-process message bus.

pub mod cycle;
pub mod document;
mod error;
pub mod format;
mod options;
mod result_ext;
pub mod retriever;
pub mod store;

pub use cycle::{CycleOutcome, CycleRunner};
pub use document::Document;
pub use error::{
    ConfigurationError, DecodeError, MergeError, RelayError, StoreFailure, StoreFailures,
    StoreFetchError,
};
pub use format::{FormatDecoder, FormatRegistry};
pub use options::{ENV_PREFIX, MandatoryStorePolicy, RetrieverOptions, StoreSpec};
pub use result_ext::RelayResultExt;
pub use retriever::{
    ConfigChange, ConfigListener, Listener, Retriever, RetrieverBuilder, RetrieverState,
    Scheduler, Snapshot, Subscription, TokioScheduler,
};
pub use store::{ConfigStore, StoreContext, StoreFactory, StorePayload, StoreRegistry};

/// Re-exported so callers can build documents without a direct dependency.
pub use serde_json;

/// Result type used throughout the crate.
///
/// Errors are shared so one failure can be handed to many listeners.
pub type RelayResult<T> = Result<T, std::sync::Arc<RelayError>>;
