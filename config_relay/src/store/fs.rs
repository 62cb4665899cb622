//! Shared filesystem helpers for the file and directory stores.

use std::io;
use std::sync::Arc;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::{RelayError, RelayResult, StoreFetchError};

/// Return the parent directory of `path`, falling back to `"."` when the path
/// has no parent or the parent is empty.
pub(super) fn parent_or_dot(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

/// Read the file at `path` by opening its parent directory via `cap-std`.
pub(super) fn read_file(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("cannot determine file name for configuration path"))?;
    let dir = Dir::open_ambient_dir(parent_or_dot(path), ambient_authority())?;
    dir.read(file_name)
}

/// Open `path` as a capability-scoped directory.
pub(super) fn open_dir(path: &Utf8Path) -> io::Result<Dir> {
    Dir::open_ambient_dir(path, ambient_authority())
}

/// Map an I/O failure on `location` to a fetch error for `store`.
pub(super) fn io_error(store: &str, location: &Utf8Path, err: io::Error) -> Arc<RelayError> {
    let fetch = if err.kind() == io::ErrorKind::NotFound {
        StoreFetchError::not_found(store, location.as_str())
    } else {
        StoreFetchError::unreachable(store, err)
    };
    Arc::new(fetch.into())
}

/// Run blocking filesystem work off the async workers.
pub(super) async fn blocking<T, F>(store: &'static str, work: F) -> RelayResult<T>
where
    F: FnOnce() -> RelayResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|join| Arc::new(StoreFetchError::unreachable(store, join).into()))?
}
