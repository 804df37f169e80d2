//! # Parse Session
//!
//! Per-document state of one analysis job: the source, its AST, the top context
//! under construction and the side tables the builders share. A session lives for
//! exactly one job; re-analysis creates a new one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use ziglens_compiler_diagnostics::{Problem, Range};
use ziglens_compiler_parser::{parse_ast, Ast, NodeIndex, TokenIndex, INVALID_TOKEN};
use ziglens_project::Project;

use crate::duchain::{
    ChainView, ContextId, ContextKind, ContextRef, DeclId, Declaration, DuChain, DuContext, FileId,
    TopDuContext,
};
use crate::identifier::Identifier;
use crate::types::Type;

/// A scope opened by `node`. Slot `0` is the node's own body, slots `1` and `2`
/// are its payload and error captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub node: NodeIndex,
    pub slot: u8,
}

impl ScopeKey {
    pub const fn body(node: NodeIndex) -> Self {
        Self { node, slot: 0 }
    }
}

/// Identity of a declaration across the builder passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeclKey {
    pub node: NodeIndex,
    pub token: TokenIndex,
}

impl DeclKey {
    pub const fn node(node: NodeIndex) -> Self {
        Self {
            node,
            token: INVALID_TOKEN,
        }
    }

    pub const fn token(node: NodeIndex, token: TokenIndex) -> Self {
        Self { node, token }
    }
}

/// Tables filled while building and read by every visitor of the job.
#[derive(Debug, Default)]
pub struct SessionTables {
    /// Semantic problems are dropped while set
    pub prebuilding: bool,
    contexts: FxHashMap<ScopeKey, ContextId>,
    declarations: FxHashMap<DeclKey, DeclId>,
    pub node_types: FxHashMap<NodeIndex, Type>,
    pub node_declarations: FxHashMap<NodeIndex, DeclId>,
    pub unresolved_imports: IndexSet<PathBuf>,
    pub resolved_imports: IndexSet<PathBuf>,
    /// Dependencies to enqueue once the result is published
    pub pending_schedules: Vec<(PathBuf, i32)>,
    pub problems: Vec<Problem>,
    /// Header scopes found by `@cInclude`, keyed by the `@cImport` declaration
    pub c_includes: Vec<(DeclId, ContextRef)>,
}

impl SessionTables {
    pub fn context_for(&self, key: ScopeKey) -> Option<ContextId> {
        self.contexts.get(&key).copied()
    }

    pub fn declaration_for(&self, key: DeclKey) -> Option<DeclId> {
        self.declarations.get(&key).copied()
    }

    pub fn report(&mut self, problem: Problem) {
        if !self.prebuilding {
            self.problems.push(problem);
        }
    }

    /// Records an import that could not be resolved yet and asks for its target
    /// to be analyzed at `priority`.
    pub fn defer_import(&mut self, path: PathBuf, priority: i32) {
        if !self
            .pending_schedules
            .iter()
            .any(|(pending, _)| pending == &path)
        {
            self.pending_schedules.push((path.clone(), priority));
        }
        self.unresolved_imports.insert(path);
    }
}

/// Read-only environment handed to expression-level visitors.
#[derive(Clone, Copy)]
pub struct Analysis<'a> {
    pub ast: &'a Ast,
    pub view: ChainView<'a>,
    pub project: &'a Project,
    pub document: &'a Path,
    pub file: FileId,
    pub priority: i32,
    pub ptr_size: u32,
}

impl<'a> Analysis<'a> {
    pub fn current(&self) -> &'a TopDuContext {
        self.view.current()
    }

    pub fn context_ref(&self, ctx: ContextId) -> ContextRef {
        ContextRef::new(self.file, ctx)
    }
}

pub struct ParseSession {
    document: PathBuf,
    source: String,
    ast: OnceLock<Arc<Ast>>,
    project: Arc<Project>,
    pub priority: i32,
    pub top: TopDuContext,
    pub tables: SessionTables,
}

impl ParseSession {
    pub fn new(
        document: PathBuf,
        source: String,
        file: FileId,
        revision: u64,
        project: Arc<Project>,
    ) -> Self {
        Self {
            top: TopDuContext::new(file, document.clone(), revision),
            document,
            source,
            ast: OnceLock::new(),
            project,
            priority: 0,
            tables: SessionTables::default(),
        }
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn file(&self) -> FileId {
        self.top.file
    }

    /// Parses the source on first call; later calls return the same tree.
    pub fn parse(&self) -> Arc<Ast> {
        self.ast
            .get_or_init(|| {
                let name = self.document.to_string_lossy();
                Arc::new(parse_ast(&name, &self.source))
            })
            .clone()
    }

    /// Splits the session into the read-only environment and the mutable tables.
    pub fn analysis<'a>(&'a mut self, chain: &'a DuChain) -> (Analysis<'a>, &'a mut SessionTables) {
        let ast: &Ast = self.ast.get_or_init(|| {
            let name = self.document.to_string_lossy();
            Arc::new(parse_ast(&name, &self.source))
        });
        let analysis = Analysis {
            ast,
            view: ChainView::new(&self.top, chain),
            project: &self.project,
            document: &self.document,
            file: self.top.file,
            priority: self.priority,
            ptr_size: self.project.target_ptr_size(),
        };
        (analysis, &mut self.tables)
    }

    /// Returns the scope registered for `key`, creating it under `parent` first.
    pub fn open_context(
        &mut self,
        key: ScopeKey,
        kind: ContextKind,
        range: Range,
        parent: ContextId,
    ) -> ContextId {
        if let Some(id) = self.tables.context_for(key) {
            if let Some(ctx) = self.top.contexts.get_mut(id) {
                ctx.kind = kind;
                ctx.range = range;
            }
            return id;
        }
        let id = self
            .top
            .contexts
            .push(DuContext::new(kind, range, Some(parent), key.node));
        if let Some(parent_ctx) = self.top.contexts.get_mut(parent) {
            parent_ctx.children.push(id);
        }
        self.tables.contexts.insert(key, id);
        id
    }

    /// Registers the root scope under the root node.
    pub fn register_root(&mut self) -> ContextId {
        let root = self.top.root();
        self.tables.contexts.insert(ScopeKey::body(NodeIndex::ROOT), root);
        root
    }

    /// Returns the declaration registered for `key`, creating it in `ctx` first.
    pub fn declare(
        &mut self,
        key: DeclKey,
        ctx: ContextId,
        identifier: Identifier,
        range: Range,
    ) -> DeclId {
        if let Some(id) = self.tables.declaration_for(key) {
            if let Some(decl) = self.top.declarations.get_mut(id) {
                decl.identifier = identifier;
                decl.range = range;
            }
            return id;
        }
        let id = self
            .top
            .declarations
            .push(Declaration::new(identifier, range, ctx, key.node));
        if let Some(ctx) = self.top.contexts.get_mut(ctx) {
            ctx.declarations.push(id);
        }
        self.tables.declarations.insert(key, id);
        if key.token == INVALID_TOKEN {
            self.tables.node_declarations.insert(key.node, id);
        }
        id
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> Option<&mut Declaration> {
        self.top.declarations.get_mut(id)
    }

    pub fn context_mut(&mut self, id: ContextId) -> Option<&mut DuContext> {
        self.top.contexts.get_mut(id)
    }

    pub fn add_imported_parent(&mut self, ctx: ContextId, parent: ContextRef) {
        if let Some(ctx) = self.top.contexts.get_mut(ctx) {
            if !ctx.imported_parents.contains(&parent) {
                ctx.imported_parents.push(parent);
            }
        }
    }

    /// Moves the tables' problems and imports into the top context.
    pub fn finish(mut self) -> TopDuContext {
        self.top.problems.extend(self.tables.problems.drain(..));
        self.top.unresolved_imports = std::mem::take(&mut self.tables.unresolved_imports);
        self.top.imports = std::mem::take(&mut self.tables.resolved_imports);
        self.top
    }
}
