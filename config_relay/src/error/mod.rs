//! Error types produced while retrieving configuration.

mod aggregate;
mod constructors;
mod conversions;
mod types;

pub use aggregate::{StoreFailure, StoreFailures};
pub use types::{ConfigurationError, DecodeError, MergeError, RelayError, StoreFetchError};
