//! Directory-backed document store.
//!
//! Layout:
//!
//! ```text
//! <dir>/
//! ├─ LOCK               # Advisory lock for single-writer
//! ├─ docs.json          # One JSON array per collection
//! └─ attachments.json
//! ```
//!
//! Documents live in an [`InMemoryDocumentStore`]; [`flush`] rewrites the
//! collection files with a write-then-rename. Dropping the store flushes
//! pending changes on a best-effort basis.
//!
//! [`flush`]: JsonFileDocumentStore::flush

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;
use crate::memory::InMemoryDocumentStore;
use crate::store::DocumentStore;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const LOCK_FILE: &str = "LOCK";
const COLLECTION_EXT: &str = "json";

/// A document store persisted as one JSON file per collection.
#[derive(Debug)]
pub struct JsonFileDocumentStore {
    dir: PathBuf,
    inner: InMemoryDocumentStore,
    dirty: AtomicBool,
    _lock_file: File,
}

impl JsonFileDocumentStore {
    /// Opens or creates a store directory and loads every collection.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryLocked` if another process holds the lock, or an
    /// I/O / JSON error if a collection file cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> CoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked);
        }

        let inner = InMemoryDocumentStore::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_EXT) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let docs: Vec<Document> = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
            inner.create_collection(name);
            for doc in docs {
                inner.replace(name, doc)?;
            }
            tracing::debug!(collection = name, "loaded collection file");
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            inner,
            dirty: AtomicBool::new(false),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Writes every collection back to disk if anything changed.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error if a file cannot be written.
    pub fn flush(&self) -> CoreResult<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.write_all();
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn write_all(&self) -> CoreResult<()> {
        for (name, docs) in self.inner.snapshot() {
            let path = self.collection_path(&name)?;
            let temp = path.with_extension("json.tmp");
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer(&mut writer, &docs)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            drop(writer);
            fs::rename(&temp, &path)?;
        }
        Ok(())
    }

    fn collection_path(&self, name: &str) -> CoreResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CoreError::invalid_document(format!(
                "invalid collection name: {name}"
            )));
        }
        Ok(self.dir.join(format!("{name}.{COLLECTION_EXT}")))
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl DocumentStore for JsonFileDocumentStore {
    fn collections(&self) -> CoreResult<Vec<String>> {
        self.inner.collections()
    }

    fn get(&self, collection: &str, id: &str) -> CoreResult<Option<Document>> {
        self.inner.get(collection, id)
    }

    fn find_page(
        &self,
        collection: &str,
        filter: &Filter,
        after_id: Option<&str>,
        limit: usize,
    ) -> CoreResult<Vec<Document>> {
        self.inner.find_page(collection, filter, after_id, limit)
    }

    fn insert(&self, collection: &str, doc: Document) -> CoreResult<()> {
        self.collection_path(collection)?;
        self.inner.insert(collection, doc)?;
        self.touch();
        Ok(())
    }

    fn replace(&self, collection: &str, doc: Document) -> CoreResult<bool> {
        self.collection_path(collection)?;
        let replaced = self.inner.replace(collection, doc)?;
        self.touch();
        Ok(replaced)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> CoreResult<usize> {
        let removed = self.inner.delete_many(collection, filter)?;
        if removed > 0 {
            self.touch();
        }
        Ok(removed)
    }
}

impl Drop for JsonFileDocumentStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.dir.display(), error = %e, "failed to flush document store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = JsonFileDocumentStore::open(dir.path()).unwrap();
            store
                .insert("docs", Document::new("a", "article").with("slug", "a"))
                .unwrap();
            store.insert("attachments", Document::new("f", "attachment")).unwrap();
            store.flush().unwrap();
        }

        let store = JsonFileDocumentStore::open(dir.path()).unwrap();
        assert_eq!(store.collections().unwrap(), vec!["attachments", "docs"]);
        assert_eq!(store.get("docs", "a").unwrap().unwrap().slug(), Some("a"));
    }

    #[test]
    fn drop_flushes_pending_writes() {
        let dir = tempdir().unwrap();
        {
            let store = JsonFileDocumentStore::open(dir.path()).unwrap();
            store.insert("docs", Document::new("a", "article")).unwrap();
        }
        assert!(dir.path().join("docs.json").exists());
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = JsonFileDocumentStore::open(dir.path()).unwrap();
        let err = JsonFileDocumentStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::DirectoryLocked));
    }

    #[test]
    fn rejects_path_like_collection_names() {
        let dir = tempdir().unwrap();
        let store = JsonFileDocumentStore::open(dir.path()).unwrap();
        assert!(store.insert("../escape", Document::new("a", "x")).is_err());
        assert!(store.insert(".hidden", Document::new("a", "x")).is_err());
    }

    #[test]
    fn deletes_are_persisted() {
        let dir = tempdir().unwrap();
        {
            let store = JsonFileDocumentStore::open(dir.path()).unwrap();
            store.insert("docs", Document::new("a", "article")).unwrap();
            store.insert("docs", Document::new("b", "group")).unwrap();
            store
                .delete_many("docs", &Filter::all().with_type("article"))
                .unwrap();
        }
        let store = JsonFileDocumentStore::open(dir.path()).unwrap();
        assert!(store.get("docs", "a").unwrap().is_none());
        assert!(store.get("docs", "b").unwrap().is_some());
    }
}
