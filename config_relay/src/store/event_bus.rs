//! In-process message bus and the store that listens on it.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{Document, RelayResult};

use super::{ConfigStore, StoreContext, StoreFactory, StorePayload};

static GLOBAL: LazyLock<MessageBus> = LazyLock::new(MessageBus::new);

/// Address-keyed latest-value channels.
///
/// Publishing replaces the value held at an address; stores listening on the
/// address serve whatever was published last. Clones share the same
/// addresses.
#[derive(Clone, Debug, Default)]
pub struct MessageBus {
    addresses: Arc<Mutex<HashMap<String, watch::Sender<Option<StorePayload>>>>>,
}

impl MessageBus {
    /// Create an isolated bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide bus used by the default `event-bus` store.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Publish `payload` on `address`.
    pub fn publish(&self, address: &str, payload: StorePayload) {
        tracing::debug!(address, "publishing configuration message");
        self.sender(address).send_replace(Some(payload));
    }

    /// Publish an already structured document.
    pub fn publish_document(&self, address: &str, document: Document) {
        self.publish(address, StorePayload::Document(document));
    }

    /// Publish bytes to be decoded with the listening store's format.
    pub fn publish_bytes(&self, address: &str, bytes: impl Into<Vec<u8>>) {
        self.publish(address, StorePayload::Raw(bytes.into()));
    }

    fn subscribe(&self, address: &str) -> watch::Receiver<Option<StorePayload>> {
        self.sender(address).subscribe()
    }

    fn sender(&self, address: &str) -> watch::Sender<Option<StorePayload>> {
        self.addresses
            .lock()
            .entry(address.to_owned())
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }
}

/// Factory for the `event-bus` store. Requires an `address` option.
#[derive(Clone, Debug)]
pub struct EventBusStoreFactory {
    bus: MessageBus,
}

impl EventBusStoreFactory {
    /// Create a factory whose stores listen on `bus`.
    #[must_use]
    pub const fn new(bus: MessageBus) -> Self {
        Self { bus }
    }
}

impl StoreFactory for EventBusStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        let address = context.required_str("address")?;
        Ok(Box::new(EventBusStore {
            latest: self.bus.subscribe(address),
        }))
    }
}

struct EventBusStore {
    latest: watch::Receiver<Option<StorePayload>>,
}

#[async_trait]
impl ConfigStore for EventBusStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        Ok(self
            .latest
            .borrow()
            .clone()
            .unwrap_or_else(|| StorePayload::Document(crate::document::empty())))
    }
}
