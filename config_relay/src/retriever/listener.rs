//! Change, error and end notifications.

use std::cell::Cell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use crate::document::{PathChange, diff};
use crate::{Document, RelayError, RelayResult, StoreFailure};

/// A snapshot replacement.
#[derive(Clone, Debug)]
pub struct ConfigChange {
    previous: Arc<Document>,
    current: Arc<Document>,
    version: u64,
}

impl ConfigChange {
    pub(crate) const fn new(previous: Arc<Document>, current: Arc<Document>, version: u64) -> Self {
        Self {
            previous,
            current,
            version,
        }
    }

    /// The document that was replaced.
    #[must_use]
    pub const fn previous(&self) -> &Arc<Document> {
        &self.previous
    }

    /// The document now published.
    #[must_use]
    pub const fn current(&self) -> &Arc<Document> {
        &self.current
    }

    /// Version of the new snapshot.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Dotted paths that were added, removed or modified.
    #[must_use]
    pub fn changed_paths(&self) -> Vec<PathChange> {
        diff(&self.previous, &self.current)
    }
}

/// Receives retriever events.
///
/// Callbacks run on the retriever's task, one event at a time, so they should
/// return quickly. A panicking callback is logged and does not affect other
/// listeners.
pub trait ConfigListener: Send + Sync + 'static {
    /// The published configuration changed.
    fn on_change(&self, _change: &ConfigChange) {}

    /// A store failed during a cycle.
    fn on_error(&self, _failure: &StoreFailure) {}

    /// The retriever closed; no further events follow.
    fn on_end(&self) {}
}

type ChangeFn = Box<dyn Fn(&ConfigChange) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&StoreFailure) + Send + Sync>;
type EndFn = Box<dyn Fn() + Send + Sync>;

/// A [`ConfigListener`] assembled from closures.
///
/// # Examples
///
/// ```rust
/// use config_relay::Listener;
///
/// let listener = Listener::new()
///     .on_change(|change| println!("now at version {}", change.version()))
///     .on_error(|failure| eprintln!("{failure}"));
/// # let _ = listener;
/// ```
#[derive(Default)]
pub struct Listener {
    change: Option<ChangeFn>,
    error: Option<ErrorFn>,
    end: Option<EndFn>,
}

impl Listener {
    /// A listener that ignores every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle configuration changes.
    #[must_use]
    pub fn on_change(mut self, f: impl Fn(&ConfigChange) + Send + Sync + 'static) -> Self {
        self.change = Some(Box::new(f));
        self
    }

    /// Handle store failures.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&StoreFailure) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Handle the end of the event stream.
    #[must_use]
    pub fn on_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.end = Some(Box::new(f));
        self
    }
}

impl ConfigListener for Listener {
    fn on_change(&self, change: &ConfigChange) {
        if let Some(f) = &self.change {
            f(change);
        }
    }

    fn on_error(&self, failure: &StoreFailure) {
        if let Some(f) = &self.error {
            f(failure);
        }
    }

    fn on_end(&self) {
        if let Some(f) = &self.end {
            f();
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("on_change", &self.change.is_some())
            .field("on_error", &self.error.is_some())
            .field("on_end", &self.end.is_some())
            .finish()
    }
}

struct Slot {
    id: u64,
    listener: Box<dyn ConfigListener>,
    // Held for the duration of every callback; cancellation takes it too.
    active: ReentrantMutex<Cell<bool>>,
}

impl Slot {
    fn deliver(&self, event: &'static str, call: impl FnOnce(&dyn ConfigListener)) {
        let active = self.active.lock();
        if !active.get() {
            return;
        }
        let listener = self.listener.as_ref();
        if catch_unwind(AssertUnwindSafe(|| call(listener))).is_err() {
            tracing::warn!(subscription = self.id, event, "configuration listener panicked");
        }
    }

    fn deactivate(&self) -> bool {
        let active = self.active.lock();
        active.replace(false)
    }
}

#[derive(Default)]
struct Table {
    next_id: u64,
    slots: Vec<Arc<Slot>>,
    ended: bool,
}

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    table: Mutex<Table>,
}

impl ListenerSet {
    pub(crate) fn add(self: &Arc<Self>, listener: Box<dyn ConfigListener>) -> RelayResult<Subscription> {
        let mut table = self.table.lock();
        if table.ended {
            return Err(RelayError::closed());
        }
        table.next_id += 1;
        let id = table.next_id;
        table.slots.push(Arc::new(Slot {
            id,
            listener,
            active: ReentrantMutex::new(Cell::new(true)),
        }));
        Ok(Subscription {
            id,
            set: Arc::clone(self),
        })
    }

    fn live(&self) -> Vec<Arc<Slot>> {
        self.table.lock().slots.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.table.lock().slots.len()
    }

    pub(crate) fn error(&self, failure: &StoreFailure) {
        for slot in self.live() {
            slot.deliver("error", |listener| listener.on_error(failure));
        }
    }

    pub(crate) fn change(&self, change: &ConfigChange) {
        for slot in self.live() {
            slot.deliver("change", |listener| listener.on_change(change));
        }
    }

    /// Deliver `on_end` to every live listener and refuse new ones.
    pub(crate) fn end(&self) {
        let slots = {
            let mut table = self.table.lock();
            table.ended = true;
            table.slots.clone()
        };
        for slot in &slots {
            slot.deliver("end", |listener| listener.on_end());
            slot.deactivate();
        }
        self.table.lock().slots.clear();
    }

    fn cancel(&self, id: u64) {
        let slot = {
            let mut table = self.table.lock();
            table
                .slots
                .iter()
                .position(|slot| slot.id == id)
                .map(|at| table.slots.remove(at))
        };
        if let Some(slot) = slot
            && slot.deactivate()
        {
            tracing::debug!(subscription = id, "configuration listener cancelled");
        }
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`Subscription::cancel`] to remove it.
pub struct Subscription {
    id: u64,
    set: Arc<ListenerSet>,
}

impl Subscription {
    /// Remove the listener.
    ///
    /// Idempotent. Once this returns no callback of the listener starts
    /// again; a callback already running on another thread is waited for.
    pub fn cancel(&self) {
        self.set.cancel(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
