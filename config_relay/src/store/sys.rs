//! Store exposing the process property table.

use std::sync::OnceLock;

use async_trait::async_trait;

use crate::document::{self, EntryOptions};
use crate::{Document, RelayResult};

use super::system_properties;
use super::{ConfigStore, StoreContext, StoreFactory, StorePayload};

/// Factory for the `sys` store.
///
/// Options: `cache` (default `true`) captures the table on the first fetch
/// and serves that copy afterwards; `raw-data` and `hierarchical` control how
/// entries become a document.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysStoreFactory;

impl StoreFactory for SysStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        Ok(Box::new(SysStore {
            cache: context.bool_or("cache", true),
            options: EntryOptions::from_options(context.config()),
            cached: OnceLock::new(),
        }))
    }
}

struct SysStore {
    cache: bool,
    options: EntryOptions,
    cached: OnceLock<Document>,
}

impl SysStore {
    fn capture(&self) -> Document {
        document::from_entries(system_properties::properties(), self.options)
    }
}

#[async_trait]
impl ConfigStore for SysStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        let doc = if self.cache {
            self.cached.get_or_init(|| self.capture()).clone()
        } else {
            self.capture()
        };
        Ok(StorePayload::Document(doc))
    }
}
