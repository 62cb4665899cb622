//! Store reading a single file.

use async_trait::async_trait;
use camino::Utf8PathBuf;

use crate::RelayResult;

use super::fs::{blocking, io_error, read_file};
use super::{ConfigStore, StoreContext, StoreFactory, StorePayload};

const STORE: &str = "file";

/// Factory for the `file` store. Requires a `path` option.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileStoreFactory;

impl StoreFactory for FileStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        let path = Utf8PathBuf::from(context.required_str("path")?);
        Ok(Box::new(FileStore { path }))
    }
}

struct FileStore {
    path: Utf8PathBuf,
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        let path = self.path.clone();
        blocking(STORE, move || {
            read_file(&path)
                .map(StorePayload::Raw)
                .map_err(|err| io_error(STORE, &path, err))
        })
        .await
    }
}
