//! Store scanning a directory tree for configuration files.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use serde_json::Value;

use crate::document;
use crate::format::FormatRegistry;
use crate::{Document, RelayResult, RelayResultExt};

use super::fs::{blocking, io_error, open_dir};
use super::{AntPattern, ConfigStore, StoreContext, StoreFactory, StorePayload};

const STORE: &str = "directory";

/// Factory for the `directory` store.
///
/// Requires `path` and a non-empty `filesets` array of
/// `{"pattern": ..., "format": ...}` objects. A fileset without a `format`
/// uses the store's declared format. Every format is resolved when the store
/// is created.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectoryStoreFactory;

#[derive(Clone, Debug)]
struct FileSet {
    pattern: AntPattern,
    format: String,
}

impl StoreFactory for DirectoryStoreFactory {
    fn create(&self, context: &StoreContext<'_>) -> RelayResult<Box<dyn ConfigStore>> {
        let root = Utf8PathBuf::from(context.required_str("path")?);
        let Some(Value::Array(entries)) = context.config().get("filesets") else {
            return Err(context.invalid("the 'filesets' option must be an array"));
        };
        if entries.is_empty() {
            return Err(context.invalid("at least one fileset is required"));
        }
        let filesets = entries
            .iter()
            .map(|entry| {
                let pattern = entry
                    .get("pattern")
                    .and_then(Value::as_str)
                    .ok_or_else(|| context.invalid("each fileset needs a 'pattern'"))?;
                let format = entry
                    .get("format")
                    .and_then(Value::as_str)
                    .unwrap_or(&context.spec().format);
                context
                    .formats()
                    .lookup(format)?
                    .validate(context.config())
                    .into_relay()?;
                Ok(FileSet {
                    pattern: AntPattern::new(pattern),
                    format: format.to_owned(),
                })
            })
            .collect::<RelayResult<Vec<_>>>()?;
        Ok(Box::new(DirectoryStore {
            root,
            filesets,
            formats: context.formats().clone(),
            options: context.config().clone(),
        }))
    }
}

struct DirectoryStore {
    root: Utf8PathBuf,
    filesets: Vec<FileSet>,
    formats: FormatRegistry,
    options: Document,
}

#[async_trait]
impl ConfigStore for DirectoryStore {
    async fn fetch(&self) -> RelayResult<StorePayload> {
        let root = self.root.clone();
        let files = blocking(STORE, move || {
            let dir = open_dir(&root).map_err(|err| io_error(STORE, &root, err))?;
            let mut files = Vec::new();
            walk(&dir, Utf8Path::new(""), &mut files)
                .map_err(|err| io_error(STORE, &root, err))?;
            files.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(files)
        })
        .await?;

        let mut docs = Vec::new();
        for fileset in &self.filesets {
            for (path, bytes) in &files {
                if !fileset.pattern.matches(path.as_str()) {
                    continue;
                }
                tracing::trace!(file = %path, format = %fileset.format, "decoding directory entry");
                docs.push(self.formats.decode(&fileset.format, bytes, &self.options)?);
            }
        }
        document::merge(docs)
            .into_relay()
            .map(StorePayload::Document)
    }
}

fn walk(
    dir: &Dir,
    prefix: &Utf8Path,
    out: &mut Vec<(Utf8PathBuf, Vec<u8>)>,
) -> std::io::Result<()> {
    for item in dir.entries()? {
        let entry = item?;
        let name = entry.file_name()?;
        let relative = prefix.join(&name);
        let kind = entry.file_type()?;
        if kind.is_dir() {
            walk(&entry.open_dir()?, &relative, out)?;
        } else if kind.is_file() {
            out.push((relative, dir.read(&name)?));
        }
    }
    Ok(())
}
