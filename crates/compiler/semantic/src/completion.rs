//! # Completion
//!
//! Identifier and member completion over an analyzed file. The text in front of
//! the cursor decides between the two: a dotted name chain ending in `.` lists the
//! members of whatever the chain resolves to, anything else lists the names visible
//! at the cursor.

use rustc_hash::FxHashSet;
use ziglens_compiler_diagnostics::Position;
use ziglens_compiler_parser::{complete_expr, CompletionIntent};

use crate::duchain::{
    ChainView, ContextHandle, ContextRef, DeclFlags, DeclHandle, DeclRef, DeclarationKind,
    DuChain, TopDuContext,
};
use crate::helpers::{access_attribute, declaration_for_name, internal_context_of};
use crate::identifier::Identifier;
use crate::types::Type;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionKind {
    Variable,
    Field,
    Function,
    Type,
    Module,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionItem {
    pub name: String,
    /// Rendered type of the declaration
    pub detail: String,
    pub declaration: DeclRef,
    pub kind: CompletionKind,
}

impl CompletionItem {
    fn from_declaration(decl: &DeclHandle<'_>) -> Self {
        let kind = if decl.is_module() || decl.ty.is_module() {
            CompletionKind::Module
        } else {
            match decl.kind {
                DeclarationKind::Function => CompletionKind::Function,
                DeclarationKind::Type => CompletionKind::Type,
                DeclarationKind::Alias => CompletionKind::Module,
                DeclarationKind::Instance if decl.flags.contains(DeclFlags::CLASS_MEMBER) => {
                    CompletionKind::Field
                }
                DeclarationKind::Instance => CompletionKind::Variable,
            }
        };
        Self {
            name: decl.identifier.to_string(),
            detail: decl.ty.to_string(),
            declaration: decl.decl_ref(),
            kind,
        }
    }
}

/// Completion items for a cursor at `position` in `top`, with `text_before` the
/// text of the line up to the cursor.
pub fn complete(
    chain: &DuChain,
    top: &TopDuContext,
    text_before: &str,
    position: Position,
) -> Vec<CompletionItem> {
    let view = ChainView::new(top, chain);
    let ctx = ContextRef::new(top.file, top.context_at(position));
    let items = match complete_expr(text_before) {
        CompletionIntent::Field { chain: names } => {
            let Some(ty) = resolve_chain(view, &names, position, ctx) else {
                return Vec::new();
            };
            member_items(view, &ty)
        }
        CompletionIntent::Unknown => visible_items(view, ctx),
    };
    tracing::debug!("{} completion items at {}", items.len(), position);
    items
}

/// Type of `a.b.c`, resolving `a` lexically and the rest as members.
fn resolve_chain(
    view: ChainView<'_>,
    names: &[String],
    position: Position,
    ctx: ContextRef,
) -> Option<Type> {
    let (first, rest) = names.split_first()?;
    let decl = declaration_for_name(view, Identifier::new(first), position, ctx, None)?;
    let mut ty = decl.ty.clone();
    for name in rest {
        ty = access_attribute(view, &ty, Identifier::new(name))?.ty.clone();
    }
    Some(ty)
}

fn member_items(view: ChainView<'_>, ty: &Type) -> Vec<CompletionItem> {
    let Some(ctx) = internal_context_of(view, ty).and_then(|c| view.context(c)) else {
        return Vec::new();
    };
    let mut items = Vec::new();
    let mut visited = FxHashSet::default();
    collect_members(view, &ctx, &mut visited, &mut items);
    items
}

fn collect_members(
    view: ChainView<'_>,
    ctx: &ContextHandle<'_>,
    visited: &mut FxHashSet<ContextRef>,
    items: &mut Vec<CompletionItem>,
) {
    if !visited.insert(ctx.context_ref()) {
        return;
    }
    let top = ctx.top();
    for &id in &ctx.declarations {
        let decl = DeclHandle::new(top.clone(), id);
        if decl.is_nameable() && decl.kind != DeclarationKind::Alias {
            items.push(CompletionItem::from_declaration(&decl));
        }
    }
    for &imported in &ctx.imported_parents {
        if let Some(parent) = view.context(imported) {
            collect_members(view, &parent, visited, items);
        }
    }
}

/// Names declared in `ctx` and its ancestors, innermost first; a name shadowed by
/// an inner scope is listed once.
fn visible_items(view: ChainView<'_>, ctx: ContextRef) -> Vec<CompletionItem> {
    let mut seen = FxHashSet::default();
    let mut items = Vec::new();
    let mut current = view.context(ctx);
    while let Some(ctx) = current {
        let top = ctx.top();
        for &id in ctx.declarations.iter().rev() {
            let decl = DeclHandle::new(top.clone(), id);
            if decl.is_nameable() && seen.insert(decl.identifier) {
                items.push(CompletionItem::from_declaration(&decl));
            }
        }
        current = ctx.parent();
    }
    items
}
