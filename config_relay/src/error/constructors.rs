//! Shorthand constructors for the error enums.

use std::sync::Arc;
use std::time::Duration;

use super::{
    ConfigurationError, DecodeError, RelayError, StoreFailures, StoreFetchError,
};

impl RelayError {
    /// Shared [`RelayError::Closed`] value.
    #[must_use]
    pub fn closed() -> Arc<Self> {
        Arc::new(Self::Closed)
    }

    /// Build an [`RelayError::Initialization`] from the first cycle's failures.
    #[must_use]
    pub fn initialization(failures: StoreFailures) -> Arc<Self> {
        Arc::new(Self::Initialization(Box::new(failures)))
    }

    /// Failures carried by an initialization error, if this is one.
    #[must_use]
    pub fn initialization_failures(&self) -> Option<&StoreFailures> {
        match self {
            Self::Initialization(failures) => Some(failures),
            _ => None,
        }
    }
}

impl StoreFetchError {
    /// Construct an [`StoreFetchError::Unreachable`] for `store`.
    ///
    /// # Examples
    ///
    /// ```
    /// use config_relay::StoreFetchError;
    /// let err = StoreFetchError::unreachable("http", "connection refused");
    /// assert!(err.to_string().contains("connection refused"));
    /// ```
    #[must_use]
    pub fn unreachable(
        store: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Unreachable {
            store: store.to_owned(),
            source: source.into(),
        }
    }

    /// Construct a [`StoreFetchError::Timeout`] for `store`.
    #[must_use]
    pub fn timeout(store: &str, after: Duration) -> Self {
        Self::Timeout {
            store: store.to_owned(),
            after,
        }
    }

    /// Construct a [`StoreFetchError::NotFound`] for `store`.
    #[must_use]
    pub fn not_found(store: &str, location: impl Into<String>) -> Self {
        Self::NotFound {
            store: store.to_owned(),
            location: location.into(),
        }
    }

    /// Wrap into the shared error type returned by stores.
    #[must_use]
    pub fn into_arc(self) -> Arc<RelayError> {
        Arc::new(self.into())
    }
}

impl DecodeError {
    /// Construct a [`DecodeError::Syntax`] for `format`.
    #[must_use]
    pub fn syntax(format: &str, message: impl ToString) -> Self {
        Self::Syntax {
            format: format.to_owned(),
            message: message.to_string(),
        }
    }

    /// Construct a [`DecodeError::UnsupportedFormat`] for `format`.
    #[must_use]
    pub fn unsupported(format: &str, message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.to_owned(),
            message: message.into(),
        }
    }
}

impl ConfigurationError {
    /// Construct a [`ConfigurationError::InvalidSpec`] for `store_type`.
    #[must_use]
    pub fn invalid(store_type: &str, message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            store_type: store_type.to_owned(),
            message: message.into(),
        }
    }

    /// [`Self::invalid`] wrapped for direct return from fallible helpers.
    #[must_use]
    pub fn invalid_arc(store_type: &str, message: impl Into<String>) -> Arc<RelayError> {
        Arc::new(Self::invalid(store_type, message).into())
    }
}
