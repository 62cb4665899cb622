//! Extensions for mapping errors to `RelayResult` concisely.
//!
//! These helpers reduce repetitive `.map_err(|e| Arc::new(e.into()))`
//! patterns when converting typed errors into the crate's
//! `RelayResult<T>` alias (`Result<T, Arc<RelayError>>`).
//!
//! # Examples
//!
//! ```
//! use config_relay::{DecodeError, RelayResult, RelayResultExt};
//!
//! fn parse(bytes: &[u8]) -> RelayResult<serde_json::Value> {
//!     serde_json::from_slice(bytes)
//!         .map_err(DecodeError::from)
//!         .into_relay()
//! }
//!
//! assert!(parse(b"{}").is_ok());
//! assert!(parse(b"{").is_err());
//! ```

use std::sync::Arc;

use crate::{RelayError, RelayResult};

/// Generic extension for mapping any `Result<T, E>` with `E: Into<RelayError>`
/// into a `RelayResult<T>`.
pub trait RelayResultExt<T, E> {
    /// Convert `Result<T, E>` into `RelayResult<T>` using `Into<RelayError>`.
    ///
    /// # Errors
    ///
    /// Propagates the original error after conversion into `Arc<RelayError>`.
    fn into_relay(self) -> RelayResult<T>;
}

impl<T, E> RelayResultExt<T, E> for Result<T, E>
where
    E: Into<RelayError>,
{
    fn into_relay(self) -> RelayResult<T> {
        self.map_err(|e| Arc::new(e.into()))
    }
}
