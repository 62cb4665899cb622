//! One retrieval cycle: fetch every store, decode, and collect the results.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;

use crate::format::FormatRegistry;
use crate::store::{ConfigStore, StorePayload, StoreRegistry};
use crate::{
    Document, MergeError, RelayResult, RelayResultExt, StoreFailure, StoreFailures,
    StoreFetchError, StoreSpec, document,
};

/// Result of a cycle, keyed by store declaration index.
#[derive(Clone, Debug, Default)]
pub struct CycleOutcome {
    /// Documents from the stores that succeeded.
    pub succeeded: BTreeMap<usize, Document>,
    /// Failures from the stores that did not.
    pub failed: BTreeMap<usize, StoreFailure>,
}

impl CycleOutcome {
    /// Merge the succeeded documents in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::NonObjectRoot`] if a succeeded document is not an
    /// object. The runner already rejects those, so this only fails for
    /// hand-built outcomes.
    pub fn merge(&self) -> Result<Document, MergeError> {
        document::merge(self.succeeded.values().cloned())
    }

    /// Whether no store succeeded.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty()
    }

    /// All failures, in declaration order.
    #[must_use]
    pub fn failures(&self) -> StoreFailures {
        self.failed.values().cloned().collect()
    }

    /// Failures of stores not declared optional.
    pub fn mandatory_failures(&self) -> impl Iterator<Item = &StoreFailure> {
        self.failed.values().filter(|failure| !failure.is_optional())
    }
}

struct BoundStore {
    spec: StoreSpec,
    store: Box<dyn ConfigStore>,
}

/// Stores resolved from their declarations, ready to be polled.
pub struct CycleRunner {
    stores: Vec<BoundStore>,
    formats: FormatRegistry,
    timeout: Option<Duration>,
}

impl CycleRunner {
    /// Resolve every declaration against the registries.
    ///
    /// Store options and format options are validated here, so a runner
    /// that binds can only fail per cycle.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::ConfigurationError`] met, for example an
    /// unknown store type or format.
    pub fn bind(
        specs: &[StoreSpec],
        stores: &StoreRegistry,
        formats: &FormatRegistry,
    ) -> RelayResult<Self> {
        let mut bound = Vec::with_capacity(specs.len());
        for spec in specs {
            let created = formats
                .lookup(&spec.format)
                .and_then(|decoder| decoder.validate(&spec.config).into_relay())
                .and_then(|()| stores.create(spec, formats));
            match created {
                Ok(store) => bound.push(BoundStore {
                    spec: spec.clone(),
                    store,
                }),
                Err(error) => {
                    close_detached(bound);
                    return Err(error);
                }
            }
        }
        Ok(Self {
            stores: bound,
            formats: formats.clone(),
            timeout: None,
        })
    }

    /// Bound every fetch by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of bound stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no store is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Fetch every store concurrently and wait until all have settled.
    ///
    /// A failing store never aborts the cycle; its failure is recorded
    /// against its index and it contributes nothing.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let settled = join_all(
            self.stores
                .iter()
                .enumerate()
                .map(|(index, bound)| async move {
                    let result = AssertUnwindSafe(self.settle(index, bound))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            Err(StoreFetchError::unreachable(
                                &bound.spec.store_type,
                                format!("store panicked: {}", panic_message(panic.as_ref())),
                            )
                            .into_arc())
                        });
                    (index, &bound.spec, result)
                }),
        )
        .await;

        let mut outcome = CycleOutcome::default();
        for (index, spec, result) in settled {
            match result {
                Ok(doc) => {
                    outcome.succeeded.insert(index, doc);
                }
                Err(error) => {
                    outcome.failed.insert(
                        index,
                        StoreFailure::new(index, &spec.store_type, spec.optional, error),
                    );
                }
            }
        }
        outcome
    }

    async fn settle(&self, index: usize, bound: &BoundStore) -> RelayResult<Document> {
        let payload = match self.timeout {
            Some(after) => tokio::time::timeout(after, bound.store.fetch())
                .await
                .map_err(|_| StoreFetchError::timeout(&bound.spec.store_type, after).into_arc())??,
            None => bound.store.fetch().await?,
        };
        let doc = match payload {
            StorePayload::Raw(bytes) => {
                self.formats
                    .decode(&bound.spec.format, &bytes, &bound.spec.config)?
            }
            StorePayload::Document(doc) => doc,
        };
        if doc.is_object() {
            Ok(doc)
        } else {
            Err(MergeError::NonObjectRoot {
                position: index,
                found: document::kind_of(&doc),
            })
            .into_relay()
        }
    }

    /// Close every bound store.
    pub async fn close(&self) {
        join_all(self.stores.iter().map(|bound| bound.store.close())).await;
    }
}

/// Close stores created before a later declaration failed to bind.
fn close_detached(stores: Vec<BoundStore>) {
    if stores.is_empty() {
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                join_all(stores.iter().map(|bound| bound.store.close())).await;
            });
        }
        Err(_) => tracing::debug!(
            stores = stores.len(),
            "no runtime to close partially bound stores; dropping them"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

impl fmt::Debug for CycleRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self
            .stores
            .iter()
            .map(|bound| bound.spec.store_type.as_str())
            .collect();
        f.debug_struct("CycleRunner")
            .field("stores", &types)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
