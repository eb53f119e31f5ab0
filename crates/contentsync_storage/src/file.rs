//! File-based binary store for a local uploads directory.

use crate::backend::{validate_path, BinaryStore};
use crate::error::{StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the hidden directory holding disabled objects.
const DISABLED_DIR: &str = ".disabled";

/// A binary store rooted at a local directory.
///
/// Enabled objects live at `root/<path>` and are what a web server would
/// expose under the public base URL. Disabling an object moves it into a
/// parallel `root/.disabled/<path>` tree, which is never served.
///
/// # Example
///
/// ```no_run
/// use contentsync_storage::{BinaryStore, FileBinaryStore};
/// use std::path::Path;
///
/// let store = FileBinaryStore::open(Path::new("public/uploads"), "/uploads").unwrap();
/// store.copy_in(Path::new("photo.jpg"), "/attachments/a1-photo.jpg").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBinaryStore {
    root: PathBuf,
    base_url: String,
}

impl FileBinaryStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path, base_url: impl Into<String>) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            base_url: base_url.into(),
        })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn enabled_path(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(&path[1..]))
    }

    fn disabled_path(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(DISABLED_DIR).join(&path[1..]))
    }

    fn move_object(from: &Path, to: &Path, path: &str) -> StorageResult<()> {
        if !from.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)?;
        Ok(())
    }
}

impl BinaryStore for FileBinaryStore {
    fn copy_in(&self, local: &Path, path: &str) -> StorageResult<()> {
        if self.disabled_path(path)?.is_file() {
            return Err(StorageError::PermissionDenied(path.to_string()));
        }
        let target = self.enabled_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(local, &target)?;
        debug!(path, "copied object into store");
        Ok(())
    }

    fn copy_out(&self, path: &str, local: &Path) -> StorageResult<()> {
        let source = self.enabled_path(path)?;
        if !source.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        fs::copy(&source, local)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        let enabled = self.enabled_path(path)?;
        if enabled.is_file() {
            fs::remove_file(enabled)?;
            return Ok(());
        }
        let disabled = self.disabled_path(path)?;
        if disabled.is_file() {
            fs::remove_file(disabled)?;
            return Ok(());
        }
        Err(StorageError::NotFound(path.to_string()))
    }

    fn enable(&self, path: &str) -> StorageResult<()> {
        Self::move_object(&self.disabled_path(path)?, &self.enabled_path(path)?, path)
    }

    fn disable(&self, path: &str) -> StorageResult<()> {
        Self::move_object(&self.enabled_path(path)?, &self.disabled_path(path)?, path)
    }

    fn is_disabled(&self, path: &str) -> StorageResult<bool> {
        if self.enabled_path(path)?.is_file() {
            Ok(false)
        } else if self.disabled_path(path)?.is_file() {
            Ok(true)
        } else {
            Err(StorageError::NotFound(path.to_string()))
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
