use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use index_vec::IndexVec;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{ContextId, ContextRef, DeclId, DeclRef, Declaration, DuContext, FileId, TopDuContext};

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    top: Option<Arc<TopDuContext>>,
}

#[derive(Debug, Default)]
struct ChainStore {
    files: IndexVec<FileId, FileEntry>,
    by_path: FxHashMap<PathBuf, FileId>,
}

/// Shared store of every analyzed file.
#[derive(Debug, Default)]
pub struct DuChain {
    store: RwLock<ChainStore>,
    /// One lock per document so that two jobs never analyze it concurrently
    url_locks: Mutex<FxHashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DuChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainStore> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainStore> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Id of `path`, registering it on first sight.
    pub fn register_file(&self, path: &Path) -> FileId {
        if let Some(id) = self.file_id(path) {
            return id;
        }
        let mut store = self.write();
        if let Some(&id) = store.by_path.get(path) {
            return id;
        }
        let id = store.files.push(FileEntry {
            path: path.to_path_buf(),
            top: None,
        });
        store.by_path.insert(path.to_path_buf(), id);
        id
    }

    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.read().by_path.get(path).copied()
    }

    pub fn path_of(&self, file: FileId) -> Option<PathBuf> {
        self.read().files.get(file).map(|entry| entry.path.clone())
    }

    /// Snapshot of the published top context of `file`.
    pub fn top(&self, file: FileId) -> Option<Arc<TopDuContext>> {
        self.read().files.get(file).and_then(|entry| entry.top.clone())
    }

    pub fn top_for_path(&self, path: &Path) -> Option<Arc<TopDuContext>> {
        let store = self.read();
        let id = *store.by_path.get(path)?;
        store.files.get(id).and_then(|entry| entry.top.clone())
    }

    /// Replaces the published result of `top.file`.
    pub fn publish(&self, top: TopDuContext) -> Arc<TopDuContext> {
        let top = Arc::new(top);
        let mut store = self.write();
        match store.files.get_mut(top.file) {
            Some(entry) => entry.top = Some(top.clone()),
            None => debug!("Dropping result for unregistered file {:?}", top.file),
        }
        top
    }

    /// Forgets the published result of `path`; the file stays registered.
    pub fn invalidate(&self, path: &Path) {
        let mut store = self.write();
        if let Some(id) = store.by_path.get(path).copied() {
            if let Some(entry) = store.files.get_mut(id) {
                entry.top = None;
            }
        }
    }

    /// Files whose last analysis could not resolve an import of `path`.
    pub fn dependents_of(&self, path: &Path) -> Vec<PathBuf> {
        self.read()
            .files
            .iter()
            .filter_map(|entry| entry.top.as_ref())
            .filter(|top| top.unresolved_imports.contains(path))
            .map(|top| top.url.clone())
            .collect()
    }

    /// Files whose last analysis resolved an import of `path`.
    pub fn importers_of(&self, path: &Path) -> Vec<PathBuf> {
        self.read()
            .files
            .iter()
            .filter_map(|entry| entry.top.as_ref())
            .filter(|top| top.imports.contains(path))
            .map(|top| top.url.clone())
            .collect()
    }

    /// Paths of all files with a published result.
    pub fn analyzed_files(&self) -> Vec<PathBuf> {
        self.read()
            .files
            .iter()
            .filter(|entry| entry.top.is_some())
            .map(|entry| entry.path.clone())
            .collect()
    }

    pub fn url_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.url_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }
}

/// A top context borrowed from a running job or shared from the store.
#[derive(Debug, Clone)]
pub enum TopHandle<'a> {
    Current(&'a TopDuContext),
    Published(Arc<TopDuContext>),
}

impl Deref for TopHandle<'_> {
    type Target = TopDuContext;

    fn deref(&self) -> &TopDuContext {
        match self {
            Self::Current(top) => *top,
            Self::Published(top) => top.as_ref(),
        }
    }
}

/// A declaration resolved through a [`ChainView`]. The id was bounds-checked when
/// the handle was created.
#[derive(Debug, Clone)]
pub struct DeclHandle<'a> {
    top: TopHandle<'a>,
    id: DeclId,
}

impl<'a> DeclHandle<'a> {
    /// `id` must be a valid declaration of `top`.
    pub(crate) fn new(top: TopHandle<'a>, id: DeclId) -> Self {
        Self { top, id }
    }

    pub fn id(&self) -> DeclId {
        self.id
    }

    pub fn decl_ref(&self) -> DeclRef {
        DeclRef::new(self.top.file, self.id)
    }

    pub fn top(&self) -> &TopHandle<'a> {
        &self.top
    }

    pub fn internal_context(&self) -> Option<ContextRef> {
        self.internal_context
            .map(|ctx| ContextRef::new(self.top.file, ctx))
    }

    pub fn context_ref(&self) -> ContextRef {
        ContextRef::new(self.top.file, self.context)
    }
}

impl Deref for DeclHandle<'_> {
    type Target = Declaration;

    fn deref(&self) -> &Declaration {
        &self.top.declarations[self.id]
    }
}

/// A scope resolved through a [`ChainView`].
#[derive(Debug, Clone)]
pub struct ContextHandle<'a> {
    top: TopHandle<'a>,
    id: ContextId,
}

impl<'a> ContextHandle<'a> {
    pub fn context_ref(&self) -> ContextRef {
        ContextRef::new(self.top.file, self.id)
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn top(&self) -> &TopHandle<'a> {
        &self.top
    }

    pub fn owner(&self) -> Option<DeclHandle<'a>> {
        let owner = self.owner?;
        self.top.declaration(owner)?;
        Some(DeclHandle {
            top: self.top.clone(),
            id: owner,
        })
    }

    pub fn parent(&self) -> Option<ContextHandle<'a>> {
        let parent = self.parent?;
        self.top.context(parent)?;
        Some(ContextHandle {
            top: self.top.clone(),
            id: parent,
        })
    }
}

impl Deref for ContextHandle<'_> {
    type Target = DuContext;

    fn deref(&self) -> &DuContext {
        &self.top.contexts[self.id]
    }
}

/// Read access to the chain from inside a job: the job's own file resolves to
/// the context under construction, every other file to its published snapshot.
#[derive(Clone, Copy)]
pub struct ChainView<'a> {
    current: &'a TopDuContext,
    chain: &'a DuChain,
}

impl<'a> ChainView<'a> {
    pub fn new(current: &'a TopDuContext, chain: &'a DuChain) -> Self {
        Self { current, chain }
    }

    pub fn current(&self) -> &'a TopDuContext {
        self.current
    }

    pub fn chain(&self) -> &'a DuChain {
        self.chain
    }

    pub fn top(&self, file: FileId) -> Option<TopHandle<'a>> {
        if file == self.current.file {
            Some(TopHandle::Current(self.current))
        } else {
            self.chain.top(file).map(TopHandle::Published)
        }
    }

    pub fn declaration(&self, decl: DeclRef) -> Option<DeclHandle<'a>> {
        let top = self.top(decl.file)?;
        top.declaration(decl.decl)?;
        Some(DeclHandle { top, id: decl.decl })
    }

    pub fn context(&self, ctx: ContextRef) -> Option<ContextHandle<'a>> {
        let top = self.top(ctx.file)?;
        top.context(ctx.ctx)?;
        Some(ContextHandle { top, id: ctx.ctx })
    }
}
