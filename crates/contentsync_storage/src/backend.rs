//! Binary store trait definition.

use crate::error::{StorageError, StorageResult};
use std::path::Path;

/// A path-addressed object store for media files.
///
/// Objects are addressed by absolute, slash-separated paths such as
/// `/attachments/abc-photo.jpg`. Every object is either **enabled**
/// (reachable through its public URL) or **disabled** (hidden from direct
/// access, typically because it only belongs to trashed documents).
///
/// # Invariants
///
/// - `copy_out` only reads enabled objects
/// - `copy_in` never overwrites a disabled object; remove it first
/// - `enable` only succeeds on a disabled object and `disable` only on an
///   enabled one
/// - Implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryBinaryStore`] - For testing
/// - [`super::FileBinaryStore`] - For a local uploads directory
pub trait BinaryStore: Send + Sync {
    /// Copies a local file into the store as an enabled object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PermissionDenied`] if a disabled object
    /// occupies the path, or an I/O error if the local file is unreadable.
    fn copy_in(&self, local: &Path, path: &str) -> StorageResult<()>;

    /// Copies an enabled object out to a local file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no enabled object exists at the
    /// path.
    fn copy_out(&self, path: &str, local: &Path) -> StorageResult<()>;

    /// Removes the object at the path, whatever its visibility.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored there.
    fn remove(&self, path: &str) -> StorageResult<()>;

    /// Makes a disabled object publicly reachable again.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no disabled object exists at
    /// the path.
    fn enable(&self, path: &str) -> StorageResult<()>;

    /// Hides an enabled object from public access.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no enabled object exists at the
    /// path.
    fn disable(&self, path: &str) -> StorageResult<()>;

    /// Returns whether the object at the path is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored there.
    fn is_disabled(&self, path: &str) -> StorageResult<bool>;

    /// Returns the public URL for the path.
    fn public_url(&self, path: &str) -> String;
}

/// Validates a store path.
///
/// Paths must be absolute, must not contain empty, `.` or `..` segments,
/// and must not contain backslashes.
///
/// # Errors
///
/// Returns [`StorageError::InvalidPath`] describing the offending path.
pub fn validate_path(path: &str) -> StorageResult<()> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;

    if rest.is_empty() || path.contains('\\') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }

    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_paths() {
        assert!(validate_path("/attachments/a1-photo.jpg").is_ok());
        assert!(validate_path("/a/b/c.d.e").is_ok());
    }

    #[test]
    fn rejects_traversal_and_relative_paths() {
        for bad in ["", "/", "attachments/x", "/a/../b", "/a//b", "/./a", "/a\\b"] {
            assert!(
                matches!(validate_path(bad), Err(StorageError::InvalidPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
