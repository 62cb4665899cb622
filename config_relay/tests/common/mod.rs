//! Shared fixtures for retriever integration tests.
//!
//! [`Scripts`] hands out named [`Script`]s; a `scripted` store declared with
//! `{"script": name}` answers each fetch with whatever its script currently
//! holds, after the script's delay. [`Recorder`] captures listener events.

#![allow(
    dead_code,
    reason = "each integration test binary uses a different subset"
)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use config_relay::{
    ConfigChange, ConfigListener, ConfigStore, Document, RelayResult, RetrieverOptions,
    StoreContext, StoreFailure, StoreFetchError, StorePayload, StoreRegistry, StoreSpec,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

/// Store type under which [`Scripts::registry`] registers scripted stores.
pub const SCRIPTED: &str = "scripted";

#[derive(Clone, Debug)]
enum Reply {
    Document(Document),
    Raw(Vec<u8>),
    Fail(String),
    Panic(String),
}

#[derive(Debug)]
struct ScriptState {
    reply: Mutex<Reply>,
    delay: Mutex<Duration>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closes: AtomicUsize,
    started: Mutex<Vec<Instant>>,
}

/// Controls what one scripted store returns.
#[derive(Clone, Debug)]
pub struct Script {
    state: Arc<ScriptState>,
}

impl Script {
    fn new() -> Self {
        Self {
            state: Arc::new(ScriptState {
                reply: Mutex::new(Reply::Document(serde_json::json!({}))),
                delay: Mutex::new(Duration::ZERO),
                fetches: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Answer with `doc`.
    pub fn set(&self, doc: Value) -> &Self {
        *self.state.reply.lock() = Reply::Document(doc);
        self
    }

    /// Answer with undecoded bytes.
    pub fn set_raw(&self, bytes: impl Into<Vec<u8>>) -> &Self {
        *self.state.reply.lock() = Reply::Raw(bytes.into());
        self
    }

    /// Fail with an unreachable error carrying `message`.
    pub fn fail(&self, message: &str) -> &Self {
        *self.state.reply.lock() = Reply::Fail(message.to_owned());
        self
    }

    /// Panic with `message` instead of answering.
    pub fn panic(&self, message: &str) -> &Self {
        *self.state.reply.lock() = Reply::Panic(message.to_owned());
        self
    }

    /// Sleep for `delay` before answering.
    pub fn delay(&self, delay: Duration) -> &Self {
        *self.state.delay.lock() = delay;
        self
    }

    /// Fetches started so far.
    pub fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    /// Largest number of fetches observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Times the store was closed.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// When each fetch started.
    pub fn started(&self) -> Vec<Instant> {
        self.state.started.lock().clone()
    }
}

struct ScriptedStore {
    script: Script,
}

#[async_trait]
impl ConfigStore for ScriptedStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        let state = &self.script.state;
        state.fetches.fetch_add(1, Ordering::SeqCst);
        state.started.lock().push(Instant::now());
        let running = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *state.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        state.in_flight.fetch_sub(1, Ordering::SeqCst);
        let reply = state.reply.lock().clone();
        match reply {
            Reply::Document(doc) => Ok(StorePayload::Document(doc)),
            Reply::Raw(bytes) => Ok(StorePayload::Raw(bytes)),
            Reply::Fail(message) => {
                Err(StoreFetchError::unreachable(SCRIPTED, message).into_arc())
            }
            Reply::Panic(message) => panic!("{message}"),
        }
    }

    async fn close(&self) {
        self.script.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Named scripts shared between a test and its stores.
#[derive(Clone, Debug, Default)]
pub struct Scripts {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
}

impl Scripts {
    /// The script called `name`, created on first use.
    pub fn get(&self, name: &str) -> Script {
        self.scripts
            .lock()
            .entry(name.to_owned())
            .or_insert_with(Script::new)
            .clone()
    }

    /// Default registry plus the `scripted` store type.
    pub fn registry(&self) -> StoreRegistry {
        let registry = StoreRegistry::with_defaults();
        let scripts = self.clone();
        registry.register(
            SCRIPTED,
            move |context: &StoreContext<'_>| -> RelayResult<Box<dyn ConfigStore>> {
                let name = context.required_str("script")?;
                Ok(Box::new(ScriptedStore {
                    script: scripts.get(name),
                }))
            },
        );
        registry
    }
}

/// Declare a scripted store driven by the script called `name`.
pub fn scripted(name: &str) -> StoreSpec {
    StoreSpec::new(SCRIPTED).with_option("script", name)
}

/// Options for `stores` with periodic scanning disabled.
pub fn manual(stores: impl IntoIterator<Item = StoreSpec>) -> RetrieverOptions {
    stores
        .into_iter()
        .fold(RetrieverOptions::new().without_scanning(), RetrieverOptions::with_store)
}

/// One observed listener event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// `on_change` with the new version and document.
    Change(u64, Value),
    /// `on_error` for the store at this index.
    Error(usize),
    /// `on_end`.
    End,
}

/// Listener recording every event it receives.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    failures: Arc<Mutex<Vec<StoreFailure>>>,
}

impl Recorder {
    /// Events so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Store failures so far.
    pub fn failures(&self) -> Vec<StoreFailure> {
        self.failures.lock().clone()
    }

    /// Number of `on_end` calls.
    pub fn ends(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| **event == Event::End)
            .count()
    }

    /// Number of `on_change` calls.
    pub fn changes(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, Event::Change(..)))
            .count()
    }
}

impl ConfigListener for Recorder {
    fn on_change(&self, change: &ConfigChange) {
        self.events
            .lock()
            .push(Event::Change(change.version(), (**change.current()).clone()));
    }

    fn on_error(&self, failure: &StoreFailure) {
        self.failures.lock().push(failure.clone());
        self.events.lock().push(Event::Error(failure.index()));
    }

    fn on_end(&self) {
        self.events.lock().push(Event::End);
    }
}
