//! # Name Resolution
//!
//! Lexical lookup of names and member access on types, shared by every visitor.
//!
//! A name is searched from the innermost scope outward. In bodies that execute in
//! order (blocks, captures) only declarations that start before the use are
//! visible; once the walk reaches a scope owned by a function, a type, or a
//! variable of a type, everything declared in it is visible regardless of order,
//! and that stays true for the rest of the walk. Scopes flattened in by
//! `usingnamespace` or `@cInclude` are searched after the locals of the scope that
//! imports them, transitively and without revisiting a scope twice.

use rustc_hash::FxHashSet;
use ziglens_compiler_diagnostics::Position;

use crate::duchain::{
    ChainView, ContextHandle, ContextKind, ContextRef, DeclHandle, DeclRef, DeclarationKind,
};
use crate::identifier::Identifier;
use crate::types::{Type, TypeKind};

/// Whether declarations after the use position are visible from inside `ctx`.
fn can_find_beyond_use(view: ChainView<'_>, ctx: &ContextHandle<'_>) -> bool {
    if ctx.kind == ContextKind::Global {
        return true;
    }
    let Some(owner) = ctx.owner() else {
        return false;
    };
    match owner.kind {
        DeclarationKind::Function | DeclarationKind::Type => true,
        DeclarationKind::Instance | DeclarationKind::Alias => {
            let parent = view.context(owner.context_ref());
            parent
                .and_then(|p| p.owner())
                .is_some_and(|o| o.kind == DeclarationKind::Type)
        }
    }
}

/// Last nameable local of `ctx` called `name` starting at or before `bound`.
fn find_local<'a>(
    ctx: &ContextHandle<'a>,
    name: Identifier,
    bound: Position,
    excluded: Option<DeclRef>,
) -> Option<DeclHandle<'a>> {
    let top = ctx.top();
    let found = ctx.declarations.iter().rev().copied().find(|&id| {
        top.declaration(id).is_some_and(|decl| {
            decl.identifier == name
                && decl.is_nameable()
                && decl.range.start <= bound
                && excluded != Some(DeclRef::new(top.file, id))
        })
    })?;
    Some(DeclHandle::new(top.clone(), found))
}

/// Searches the scopes flattened into `ctx`, depth first.
fn find_in_imported<'a>(
    view: ChainView<'a>,
    ctx: &ContextHandle<'a>,
    name: Identifier,
    visited: &mut FxHashSet<ContextRef>,
) -> Option<DeclHandle<'a>> {
    for &imported in &ctx.imported_parents {
        if !visited.insert(imported) {
            continue;
        }
        let Some(parent) = view.context(imported) else {
            continue;
        };
        if let Some(found) = find_local(&parent, name, Position::INFINITE, None) {
            return Some(found);
        }
        if let Some(found) = find_in_imported(view, &parent, name, visited) {
            return Some(found);
        }
    }
    None
}

/// Resolves `name` as seen at `location` inside `ctx`.
pub fn declaration_for_name<'a>(
    view: ChainView<'a>,
    name: Identifier,
    location: Position,
    ctx: ContextRef,
    excluded: Option<DeclRef>,
) -> Option<DeclHandle<'a>> {
    let start = view.context(ctx)?;
    let start_kind = start.kind;
    let sees_class_members = matches!(
        start_kind,
        ContextKind::Function | ContextKind::Class | ContextKind::Global
    );
    let mut visited = FxHashSet::default();
    visited.insert(ctx);
    let mut beyond_use = false;
    let mut current = Some(start);
    while let Some(ctx) = current {
        beyond_use |= can_find_beyond_use(view, &ctx);
        let bound = if beyond_use {
            Position::INFINITE
        } else {
            location
        };
        let rejected = ctx.kind == ContextKind::Class && !sees_class_members;
        if !rejected {
            if let Some(found) = find_local(&ctx, name, bound, excluded) {
                return Some(found);
            }
        }
        if let Some(found) = find_in_imported(view, &ctx, name, &mut visited) {
            return Some(found);
        }
        current = ctx.parent();
    }
    None
}

/// Member `name` declared in the body of `ctx` or in a scope flattened into it.
pub fn find_member<'a>(
    view: ChainView<'a>,
    ctx: ContextRef,
    name: Identifier,
) -> Option<DeclHandle<'a>> {
    let ctx = view.context(ctx)?;
    if let Some(found) = find_local(&ctx, name, Position::INFINITE, None) {
        return Some(found);
    }
    let mut visited = FxHashSet::default();
    visited.insert(ctx.context_ref());
    find_in_imported(view, &ctx, name, &mut visited)
}

/// Body scope of the declaration behind a structure, enum or union type, also
/// through one pointer.
pub fn internal_context_of(view: ChainView<'_>, ty: &Type) -> Option<ContextRef> {
    let decl = ty.through_pointer().declaration()?;
    view.declaration(decl)?.internal_context()
}

/// `T.name`: a member of the container behind `ty`.
pub fn access_attribute<'a>(
    view: ChainView<'a>,
    ty: &Type,
    name: Identifier,
) -> Option<DeclHandle<'a>> {
    match ty.through_pointer().kind {
        TypeKind::Structure(_) | TypeKind::Enum(_) | TypeKind::Union(_) => {
            find_member(view, internal_context_of(view, ty)?, name)
        }
        _ => None,
    }
}

/// Innermost scope of a container (or the file) enclosing `ctx`.
pub fn enclosing_container<'a>(view: ChainView<'a>, ctx: ContextRef) -> Option<ContextHandle<'a>> {
    let mut current = view.context(ctx);
    while let Some(ctx) = current {
        if matches!(
            ctx.kind,
            ContextKind::Global | ContextKind::Namespace | ContextKind::Class | ContextKind::Enum
        ) {
            return Some(ctx);
        }
        current = ctx.parent();
    }
    None
}

/// The type `@This()` evaluates to inside `ctx`.
pub fn this_type(view: ChainView<'_>, ctx: ContextRef) -> Type {
    enclosing_container(view, ctx)
        .and_then(|c| c.owner())
        .map_or_else(Type::unknown, |owner| owner.ty.clone().without_value())
}
