//! Temporary directories populated with configuration files.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// A temporary directory removed on drop.
///
/// # Examples
///
/// ```
/// use config_relay_test_helpers::fs::ConfigDir;
///
/// let dir = ConfigDir::new()?;
/// let file = dir.write("conf/app.json", r#"{"a": 1}"#)?;
/// assert!(file.ends_with("conf/app.json"));
/// # Ok::<_, anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct ConfigDir {
    root: Utf8PathBuf,
    _dir: TempDir,
}

impl ConfigDir {
    /// Create an empty directory.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or its path is not UTF-8.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temporary directory")?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|path| anyhow::anyhow!("non UTF-8 temporary path {}", path.display()))?;
        Ok(Self { root, _dir: dir })
    }

    /// Root of the directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `relative` inside the directory.
    #[must_use]
    pub fn join(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Write `contents` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails when the file or its parents cannot be written.
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> Result<Utf8PathBuf> {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {parent}"))?;
        }
        std::fs::write(&path, contents).with_context(|| format!("write {path}"))?;
        Ok(path)
    }

    /// Delete `relative`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be removed.
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self.join(relative);
        std::fs::remove_file(&path).with_context(|| format!("remove {path}"))
    }
}
