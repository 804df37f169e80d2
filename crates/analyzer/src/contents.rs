//! Cache of document contents shared by the analysis workers.
//!
//! Edited documents live here with their revision; everything else is read from
//! disk on first use and kept until it is reloaded.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use tracing::trace;

/// One revision of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: Arc<str>,
    pub revision: u64,
}

#[derive(Debug, Default)]
pub struct FileContents {
    documents: RwLock<FxHashMap<PathBuf, Document>>,
    revisions: AtomicU64,
}

impl FileContents {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, FxHashMap<PathBuf, Document>> {
        self.documents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, FxHashMap<PathBuf, Document>> {
        self.documents.write().unwrap_or_else(|e| e.into_inner())
    }

    fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Stores `text` as the newest revision of `path`.
    pub fn set(&self, path: &Path, text: impl Into<Arc<str>>) -> Document {
        let document = Document {
            text: text.into(),
            revision: self.next_revision(),
        };
        self.write_lock()
            .insert(path.to_path_buf(), document.clone());
        document
    }

    /// Current contents of `path`, read from disk if nothing is cached.
    pub fn read(&self, path: &Path) -> io::Result<Document> {
        if let Some(document) = self.read_lock().get(path) {
            return Ok(document.clone());
        }
        let text = std::fs::read_to_string(path)?;
        let mut documents = self.write_lock();
        if let Some(document) = documents.get(path) {
            return Ok(document.clone());
        }
        trace!("Loaded {} from disk", path.display());
        let document = Document {
            text: text.into(),
            revision: self.next_revision(),
        };
        documents.insert(path.to_path_buf(), document.clone());
        Ok(document)
    }

    /// Cached contents of `path`, without touching the disk.
    pub fn get(&self, path: &Path) -> Option<Document> {
        self.read_lock().get(path).cloned()
    }

    /// Drops the cached contents so the next read goes to disk.
    pub fn reload(&self, path: &Path) {
        self.write_lock().remove(path);
    }
}
