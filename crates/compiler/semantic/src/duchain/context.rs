use std::fmt::Write as _;
use std::path::PathBuf;

use bitflags::bitflags;
use index_vec::IndexVec;
use indexmap::IndexSet;
use ziglens_compiler_diagnostics::{Position, ProblemCollection, Range};
use ziglens_compiler_parser::NodeIndex;

use super::{ContextId, ContextRef, DeclId, DeclRef, Declaration, FileId};
use crate::identifier::Identifier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Root scope of a file
    Global,
    /// Struct and opaque bodies, `@cImport` blocks
    Namespace,
    /// Union bodies
    Class,
    /// Parameter scope of a function
    Function,
    /// Enum and error set bodies
    Enum,
    /// Blocks, captures and variable initializers
    Other,
}

bitflags! {
    /// How completely a top context was analyzed.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TopFeatures: u8 {
        const ALL_DECLARATIONS_CONTEXTS_AND_USES = 1 << 0;
        /// Reuse the published result when the revision did not change
        const ATTACH_AST_WITHOUT_UPDATING = 1 << 1;
        const UPDATE_HIGHLIGHTING = 1 << 2;
        /// Re-analysis triggered by a dependency becoming available
        const RESCHEDULED = 1 << 3;
    }
}

/// A reference from source to a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub range: Range,
    pub declaration: DeclRef,
}

/// A lexical scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuContext {
    pub kind: ContextKind,
    pub range: Range,
    pub parent: Option<ContextId>,
    pub children: Vec<ContextId>,
    /// Local declarations in insertion order
    pub declarations: Vec<DeclId>,
    /// Scopes flattened into this one by `usingnamespace` and `@cInclude`
    pub imported_parents: Vec<ContextRef>,
    /// Declaration whose body this scope is
    pub owner: Option<DeclId>,
    pub uses: Vec<Use>,
    /// Syntax node that opened the scope
    pub node: NodeIndex,
}

impl DuContext {
    pub fn new(kind: ContextKind, range: Range, parent: Option<ContextId>, node: NodeIndex) -> Self {
        Self {
            kind,
            range,
            parent,
            children: Vec::new(),
            declarations: Vec::new(),
            imported_parents: Vec::new(),
            owner: None,
            uses: Vec::new(),
            node,
        }
    }
}

/// The root scope of one file together with everything nested in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopDuContext {
    pub file: FileId,
    pub url: PathBuf,
    pub revision: u64,
    pub features: TopFeatures,
    pub contexts: IndexVec<ContextId, DuContext>,
    pub declarations: IndexVec<DeclId, Declaration>,
    pub problems: ProblemCollection,
    /// Imports whose target had no published top context during analysis
    pub unresolved_imports: IndexSet<PathBuf>,
    /// Imports resolved against a published top context
    pub imports: IndexSet<PathBuf>,
}

impl TopDuContext {
    pub fn new(file: FileId, url: PathBuf, revision: u64) -> Self {
        let mut contexts = IndexVec::new();
        contexts.push(DuContext::new(
            ContextKind::Global,
            Range::infinite(),
            None,
            NodeIndex::ROOT,
        ));
        Self {
            file,
            url,
            revision,
            features: TopFeatures::empty(),
            contexts,
            declarations: IndexVec::new(),
            problems: ProblemCollection::new(),
            unresolved_imports: IndexSet::new(),
            imports: IndexSet::new(),
        }
    }

    /// Whether `other` has the same scopes, declarations and uses, so that
    /// documents importing this one would see no difference.
    pub fn same_declarations(&self, other: &TopDuContext) -> bool {
        self.contexts == other.contexts && self.declarations == other.declarations
    }

    pub fn root(&self) -> ContextId {
        ContextId::new(0)
    }

    pub fn root_ref(&self) -> ContextRef {
        ContextRef::new(self.file, self.root())
    }

    pub fn context(&self, id: ContextId) -> Option<&DuContext> {
        self.contexts.get(id)
    }

    pub fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id)
    }

    /// The module declaration owning the root scope.
    pub fn owner(&self) -> Option<DeclId> {
        self.context(self.root()).and_then(|ctx| ctx.owner)
    }

    pub fn local_declarations(
        &self,
        ctx: ContextId,
    ) -> impl Iterator<Item = (DeclId, &Declaration)> + '_ {
        self.context(ctx)
            .map(|c| c.declarations.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |&id| self.declaration(id).map(|d| (id, d)))
    }

    /// Local declarations of `ctx` called `name`, in insertion order.
    pub fn find_local(&self, ctx: ContextId, name: Identifier) -> Vec<DeclId> {
        self.local_declarations(ctx)
            .filter(|(_, d)| d.identifier == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// Innermost scope containing `position`.
    pub fn context_at(&self, position: Position) -> ContextId {
        let mut current = self.root();
        'descend: loop {
            let Some(ctx) = self.context(current) else {
                return current;
            };
            for &child in &ctx.children {
                if self
                    .context(child)
                    .is_some_and(|c| c.range.contains_inclusive(position))
                {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Every scope from `ctx` up to the root, `ctx` first.
    pub fn ancestors(&self, ctx: ContextId) -> impl Iterator<Item = ContextId> + '_ {
        std::iter::successors(Some(ctx), move |&id| self.context(id).and_then(|c| c.parent))
    }

    pub fn uses(&self) -> impl Iterator<Item = &Use> + '_ {
        self.contexts.iter().flat_map(|ctx| ctx.uses.iter())
    }

    /// Indented scope tree with the declarations of each scope.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_context(self.root(), 0, &mut out);
        out
    }

    fn dump_context(&self, id: ContextId, depth: usize, out: &mut String) {
        let Some(ctx) = self.context(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}{:?}", ctx.kind);
        if let Some(owner) = ctx.owner.and_then(|o| self.declaration(o)) {
            let _ = write!(out, " ({})", owner.identifier);
        }
        out.push('\n');
        for (_, decl) in self.local_declarations(id) {
            let _ = writeln!(out, "{indent}  - {}", decl.summary());
        }
        for &child in &ctx.children {
            self.dump_context(child, depth + 1, out);
        }
    }
}
