//! In-memory binary store for testing.

use crate::backend::{validate_path, BinaryStore};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    disabled: bool,
}

/// An in-memory binary store.
///
/// Suitable for unit and integration tests. Visibility rules match the
/// file-backed store exactly, including the refusal to overwrite a
/// disabled object.
///
/// # Example
///
/// ```rust
/// use contentsync_storage::{BinaryStore, InMemoryBinaryStore};
///
/// let store = InMemoryBinaryStore::new("http://localhost:3000/uploads");
/// store.put("/attachments/a-1.txt", b"hi".to_vec()).unwrap();
/// store.disable("/attachments/a-1.txt").unwrap();
/// assert!(store.is_disabled("/attachments/a-1.txt").unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBinaryStore {
    base_url: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryBinaryStore {
    /// Creates an empty store whose public URLs start with `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stores bytes directly as an enabled object.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or a disabled object
    /// occupies it.
    pub fn put(&self, path: &str, data: Vec<u8>) -> StorageResult<()> {
        validate_path(path)?;
        let mut objects = self.objects.write();
        if objects.get(path).is_some_and(|o| o.disabled) {
            return Err(StorageError::PermissionDenied(path.to_string()));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                disabled: false,
            },
        );
        Ok(())
    }

    /// Returns the bytes stored at a path regardless of visibility.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().get(path).map(|o| o.data.clone())
    }

    /// Returns all stored paths in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn set_disabled(&self, path: &str, disabled: bool) -> StorageResult<()> {
        let mut objects = self.objects.write();
        match objects.get_mut(path) {
            Some(object) if object.disabled != disabled => {
                object.disabled = disabled;
                Ok(())
            }
            _ => Err(StorageError::NotFound(path.to_string())),
        }
    }
}

impl BinaryStore for InMemoryBinaryStore {
    fn copy_in(&self, local: &Path, path: &str) -> StorageResult<()> {
        let data = std::fs::read(local)?;
        self.put(path, data)
    }

    fn copy_out(&self, path: &str, local: &Path) -> StorageResult<()> {
        validate_path(path)?;
        let data = match self.objects.read().get(path) {
            Some(object) if !object.disabled => object.data.clone(),
            _ => return Err(StorageError::NotFound(path.to_string())),
        };
        std::fs::write(local, data)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> StorageResult<()> {
        self.objects
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn enable(&self, path: &str) -> StorageResult<()> {
        self.set_disabled(path, false)
    }

    fn disable(&self, path: &str) -> StorageResult<()> {
        self.set_disabled(path, true)
    }

    fn is_disabled(&self, path: &str) -> StorageResult<bool> {
        self.objects
            .read()
            .get(path)
            .map(|o| o.disabled)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
