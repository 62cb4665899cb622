//! Per-store failure records and their aggregation.

use std::{fmt, sync::Arc};

use super::RelayError;

/// A failure attributed to one configured store during a cycle.
///
/// Failures are cheap to clone so the same record can be handed to every
/// listener.
#[derive(Debug, Clone)]
pub struct StoreFailure {
    index: usize,
    store_type: Arc<str>,
    optional: bool,
    error: Arc<RelayError>,
}

impl StoreFailure {
    /// Record `error` against the store declared at `index`.
    #[must_use]
    pub fn new(index: usize, store_type: &str, optional: bool, error: Arc<RelayError>) -> Self {
        Self {
            index,
            store_type: Arc::from(store_type),
            optional,
            error,
        }
    }

    /// Declaration index of the failing store.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Type of the failing store.
    #[must_use]
    pub fn store_type(&self) -> &str {
        &self.store_type
    }

    /// Whether the store was declared optional.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// The underlying error.
    #[must_use]
    pub fn error(&self) -> &Arc<RelayError> {
        &self.error
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store #{} ({}): {}", self.index, self.store_type, self.error)
    }
}

/// Collection of [`StoreFailure`]s produced by a single cycle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use config_relay::{RelayError, StoreFailure, StoreFailures};
///
/// let failures = StoreFailures::new(vec![
///     StoreFailure::new(0, "file", false, Arc::new(RelayError::Closed)),
/// ]);
/// assert_eq!(failures.len(), 1);
/// assert!(failures.to_string().starts_with("1: store #0 (file)"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct StoreFailures(Vec<StoreFailure>);

impl StoreFailures {
    /// Create an aggregation from a vector of failures.
    #[must_use]
    pub const fn new(failures: Vec<StoreFailure>) -> Self {
        Self(failures)
    }

    /// Iterate over the contained failures.
    #[must_use = "iterators should be consumed to inspect failures"]
    pub fn iter(&self) -> std::slice::Iter<'_, StoreFailure> {
        self.0.iter()
    }

    /// Number of failures in the aggregation.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the aggregation holds no failures.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StoreFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no stores were configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {failure}", i + 1)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StoreFailures {
    type Item = &'a StoreFailure;
    type IntoIter = std::slice::Iter<'a, StoreFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for StoreFailures {
    type Item = StoreFailure;
    type IntoIter = std::vec::IntoIter<StoreFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<StoreFailure> for StoreFailures {
    fn from_iter<I: IntoIterator<Item = StoreFailure>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
