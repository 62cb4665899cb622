//! The retriever: periodic retrieval, snapshots and notifications.
//!
//! A [`Retriever`] is a handle to a background task that owns the bound
//! stores. The task runs one cycle at start-up and then one cycle per scan
//! period, measured from the end of the previous cycle. Readers see the
//! merged configuration through [`Retriever::get`] and
//! [`Retriever::get_cached`]; listeners registered with
//! [`Retriever::listen`] are told about changes, store failures and the end
//! of the stream.

mod actor;
mod listener;
mod scheduler;

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};

use crate::cycle::CycleRunner;
use crate::format::{FormatDecoder, FormatRegistry};
use crate::store::{StoreFactory, StoreRegistry};
use crate::{
    ConfigurationError, Document, RelayError, RelayResult, RelayResultExt, RetrieverOptions,
    StoreFailures,
};

use actor::{Actor, Command};
use listener::ListenerSet;

pub use listener::{ConfigChange, ConfigListener, Listener, Subscription};
pub use scheduler::{Scheduler, TokioScheduler};

/// Lifecycle of a retriever.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RetrieverState {
    /// The first cycle has not settled yet.
    Initializing,
    /// Waiting for the next scan or a refresh.
    Idle,
    /// A cycle is in flight.
    Polling,
    /// Closed; no cycle runs again.
    Closed,
}

/// A published configuration and its version.
///
/// The version starts at 1 and grows by one on every change.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    value: Arc<Document>,
    version: u64,
}

impl Snapshot {
    pub(crate) const fn new(value: Arc<Document>, version: u64) -> Self {
        Self { value, version }
    }

    /// The merged configuration.
    #[must_use]
    pub const fn value(&self) -> &Arc<Document> {
        &self.value
    }

    /// Monotonic version number.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Status {
    state: RetrieverState,
    snapshot: Option<Snapshot>,
    init_error: Option<Arc<RelayError>>,
    initial_failures: StoreFailures,
    cycles: u64,
}

impl Status {
    fn initializing() -> Self {
        Self {
            state: RetrieverState::Initializing,
            snapshot: None,
            init_error: None,
            initial_failures: StoreFailures::default(),
            cycles: 0,
        }
    }
}

/// Configures and starts a [`Retriever`].
pub struct RetrieverBuilder {
    options: RetrieverOptions,
    stores: StoreRegistry,
    formats: FormatRegistry,
    scheduler: Arc<dyn Scheduler>,
    listeners: Vec<Box<dyn ConfigListener>>,
}

impl RetrieverBuilder {
    /// Start from `options` with the built-in stores and formats.
    #[must_use]
    pub fn new(options: RetrieverOptions) -> Self {
        Self {
            options,
            stores: StoreRegistry::with_defaults(),
            formats: FormatRegistry::with_defaults(),
            scheduler: Arc::new(TokioScheduler),
            listeners: Vec::new(),
        }
    }

    /// Use `stores` to resolve store types. The registry stays shared with
    /// the caller.
    #[must_use]
    pub fn stores(mut self, stores: StoreRegistry) -> Self {
        self.stores = stores;
        self
    }

    /// Use `formats` to resolve formats. The registry stays shared with the
    /// caller.
    #[must_use]
    pub fn formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    /// Register a decoder before the stores are bound.
    #[must_use]
    pub fn register_processor(
        self,
        format: impl Into<String>,
        decoder: impl FormatDecoder + 'static,
    ) -> Self {
        self.formats.register(format, decoder);
        self
    }

    /// Register a store factory before the stores are bound.
    #[must_use]
    pub fn register_store_factory(
        self,
        store_type: impl Into<String>,
        factory: impl StoreFactory + 'static,
    ) -> Self {
        self.stores.register(store_type, factory);
        self
    }

    /// Drive periodic cycles with `scheduler` instead of Tokio's timer.
    #[must_use]
    pub fn scheduler(mut self, scheduler: impl Scheduler) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Register a listener that also hears about first-cycle failures.
    #[must_use]
    pub fn listen(mut self, listener: impl ConfigListener) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Bind the stores and start the retriever without waiting for the
    /// first cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when a store or format cannot be
    /// resolved, or when called outside a Tokio runtime.
    pub fn spawn(self) -> RelayResult<Retriever> {
        let runtime = Handle::try_current()
            .map_err(|_| ConfigurationError::MissingRuntime)
            .into_relay()?;
        let specs = self.options.effective_stores();
        let runner = CycleRunner::bind(&specs, &self.stores, &self.formats)?
            .with_timeout(self.options.store_timeout());

        let listeners = Arc::new(ListenerSet::default());
        for listener in self.listeners {
            listeners.add(listener)?;
        }
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(Status::initializing());
        let actor = Actor {
            runner,
            scheduler: self.scheduler,
            scan_period: self.options.scan_period(),
            policy: self.options.mandatory_store_policy,
            commands: command_rx,
            status: status_tx,
            listeners: Arc::clone(&listeners),
            refresh_waiters: Vec::new(),
            close_waiters: Vec::new(),
            cycles: 0,
        };
        tracing::debug!(
            stores = specs.len(),
            scan_period = ?self.options.scan_period(),
            "starting configuration retriever"
        );
        runtime.spawn(actor.run());

        Ok(Retriever {
            shared: Arc::new(Shared {
                commands,
                status,
                listeners,
                stores: self.stores,
                formats: self.formats,
            }),
        })
    }

    /// Start the retriever and wait for its first cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] as [`Self::spawn`] does, or
    /// [`RelayError::Initialization`] when the first cycle produced no usable
    /// configuration.
    pub async fn build(self) -> RelayResult<Retriever> {
        let retriever = self.spawn()?;
        retriever.get().await?;
        Ok(retriever)
    }
}

impl fmt::Debug for RetrieverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieverBuilder")
            .field("options", &self.options)
            .field("stores", &self.stores)
            .field("formats", &self.formats)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

struct Shared {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<Status>,
    listeners: Arc<ListenerSet>,
    stores: StoreRegistry,
    formats: FormatRegistry,
}

/// Handle to a running configuration retriever.
///
/// Clones share the same retriever. When the last handle is dropped the
/// retriever closes as if [`Retriever::close`] had been called.
///
/// # Examples
///
/// ```rust
/// use config_relay::{Retriever, RetrieverOptions, StoreSpec};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), std::sync::Arc<config_relay::RelayError>> {
/// let options = RetrieverOptions::new()
///     .without_scanning()
///     .with_store(StoreSpec::new("json").with_config(json!({"a": 1, "b": 1})))
///     .with_store(StoreSpec::new("json").with_config(json!({"b": 2})));
/// let retriever = Retriever::create(options).await?;
/// assert_eq!(*retriever.get().await?, json!({"a": 1, "b": 2}));
/// retriever.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Retriever {
    shared: Arc<Shared>,
}

impl Retriever {
    /// Start a retriever with the built-in stores and formats and wait for
    /// its first cycle.
    ///
    /// # Errors
    ///
    /// See [`RetrieverBuilder::build`].
    pub async fn create(options: RetrieverOptions) -> RelayResult<Self> {
        Self::builder(options).build().await
    }

    /// Configure a retriever before starting it.
    #[must_use]
    pub fn builder(options: RetrieverOptions) -> RetrieverBuilder {
        RetrieverBuilder::new(options)
    }

    /// Current configuration, waiting for the first cycle if it has not
    /// settled yet.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] once closed, or the initialization
    /// error when the first cycle failed.
    pub async fn get(&self) -> RelayResult<Arc<Document>> {
        let mut receiver = self.shared.status.clone();
        let status = receiver
            .wait_for(|status| status.state != RetrieverState::Initializing)
            .await
            .map_err(|_| RelayError::closed())?;
        if status.state == RetrieverState::Closed {
            return Err(status
                .init_error
                .clone()
                .unwrap_or_else(RelayError::closed));
        }
        status
            .snapshot
            .as_ref()
            .map(|snapshot| Arc::clone(snapshot.value()))
            .ok_or_else(RelayError::closed)
    }

    /// Last published configuration without waiting. `None` until the first
    /// cycle succeeds; after close, the last value stays available.
    #[must_use]
    pub fn get_cached(&self) -> Option<Arc<Document>> {
        self.snapshot().map(|snapshot| Arc::clone(snapshot.value()))
    }

    /// Last published snapshot with its version.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.shared.status.borrow().snapshot.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RetrieverState {
        self.shared.status.borrow().state
    }

    /// Whether the retriever has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == RetrieverState::Closed
    }

    /// Number of cycles that have settled, the first one included.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.shared.status.borrow().cycles
    }

    /// Store failures from the first cycle.
    #[must_use]
    pub fn initial_failures(&self) -> StoreFailures {
        self.shared.status.borrow().initial_failures.clone()
    }

    /// Register `listener` for changes, store failures and the end event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] once closed.
    pub fn listen(&self, listener: impl ConfigListener) -> RelayResult<Subscription> {
        self.ensure_open()?;
        self.shared.listeners.add(Box::new(listener))
    }

    /// Run a cycle now and wait for it to settle.
    ///
    /// While a cycle is already running the request joins it instead of
    /// queueing another one.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] when the retriever closes first.
    pub async fn refresh(&self) -> RelayResult<()> {
        let (reply, answer) = oneshot::channel();
        self.shared
            .commands
            .send(Command::Refresh(reply))
            .map_err(|_| RelayError::closed())?;
        answer.await.map_err(|_| RelayError::closed())?
    }

    /// Stop scanning, discard any in-flight cycle, notify listeners and close
    /// the stores. Calling it again does nothing.
    pub async fn close(&self) {
        let (reply, done) = oneshot::channel();
        if self.shared.commands.send(Command::Close(reply)).is_ok() {
            done.await.ok();
        }
    }

    /// Register or replace the decoder for `format`. Replacement applies from
    /// the next cycle.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] once closed.
    pub fn register_processor(
        &self,
        format: impl Into<String>,
        decoder: impl FormatDecoder + 'static,
    ) -> RelayResult<()> {
        self.ensure_open()?;
        self.shared.formats.register(format, decoder);
        Ok(())
    }

    /// Register or replace the factory for `store_type` in the shared
    /// registry. Stores already bound are not rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] once closed.
    pub fn register_store_factory(
        &self,
        store_type: impl Into<String>,
        factory: impl StoreFactory + 'static,
    ) -> RelayResult<()> {
        self.ensure_open()?;
        self.shared.stores.register(store_type, factory);
        Ok(())
    }

    fn ensure_open(&self) -> RelayResult<()> {
        if self.is_closed() {
            Err(RelayError::closed())
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.shared.status.borrow();
        f.debug_struct("Retriever")
            .field("state", &status.state)
            .field("version", &status.snapshot.as_ref().map(Snapshot::version))
            .field("cycles", &status.cycles)
            .field("listeners", &self.shared.listeners.len())
            .finish_non_exhaustive()
    }
}
