//! Store serving its own `config` object.

use async_trait::async_trait;

use crate::{Document, RelayResult};

use super::{ConfigStore, StoreContext, StoreFactory, StorePayload};

/// Factory for the `json` store, which serves the declared `config` as is.
/// Only the `json` format is accepted.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStoreFactory;

impl StoreFactory for JsonStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        let format = &context.spec().format;
        if format != "json" {
            return Err(context.invalid(format!(
                "the json store only supports the json format, not '{format}'"
            )));
        }
        Ok(Box::new(JsonStore {
            document: context.config().clone(),
        }))
    }
}

struct JsonStore {
    document: Document,
}

#[async_trait]
impl ConfigStore for JsonStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        Ok(StorePayload::Document(self.document.clone()))
    }
}
