//! Structural traversal and `Delayed` substitution.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{Modifiers, Type, TypeKind};
use crate::identifier::Identifier;

/// `Delayed` name to the concrete type bound at a call site.
pub type Bindings = FxHashMap<Identifier, Type>;

/// Receives every type reachable through [`Type::accept`]. Returning `false`
/// skips the sub-types of the visited one.
pub trait TypeVisitor {
    fn visit(&mut self, ty: &Type) -> bool;
}

impl<F: FnMut(&Type) -> bool> TypeVisitor for F {
    fn visit(&mut self, ty: &Type) -> bool {
        self(ty)
    }
}

impl Type {
    /// Direct sub-types, in a fixed order.
    pub fn children(&self) -> SmallVec<[&Self; 4]> {
        let mut out = SmallVec::new();
        match &self.kind {
            TypeKind::Unknown | TypeKind::Builtin(_) | TypeKind::Delayed(_) => {}
            TypeKind::Structure(_) => {}
            TypeKind::Pointer(p) => out.push(&*p.base),
            TypeKind::Slice(s) => out.push(&*s.elem),
            TypeKind::Optional(base) => out.push(&**base),
            TypeKind::Vector(v) => out.push(&*v.elem),
            TypeKind::ErrorUnion(e) => {
                out.push(&*e.payload);
                out.push(&*e.error);
            }
            TypeKind::Enum(e) => out.extend(e.base.as_deref()),
            TypeKind::Union(u) => {
                out.extend(u.base.as_deref());
                out.extend(u.data.as_deref());
            }
            TypeKind::Function(f) => {
                out.extend(f.args.iter());
                out.push(&*f.ret);
            }
            TypeKind::Unsure(types) => out.extend(types.iter()),
        }
        out
    }

    pub fn accept(&self, visitor: &mut dyn TypeVisitor) {
        if visitor.visit(self) {
            for child in self.children() {
                child.accept(visitor);
            }
        }
    }

    /// Rebuilds `self` with every direct sub-type replaced by `f(sub)`.
    pub fn map_children(&self, f: &mut dyn FnMut(&Self) -> Self) -> Self {
        let mut out = self.clone();
        match &mut out.kind {
            TypeKind::Unknown
            | TypeKind::Builtin(_)
            | TypeKind::Delayed(_)
            | TypeKind::Structure(_) => {}
            TypeKind::Pointer(p) => *p.base = f(&p.base),
            TypeKind::Slice(s) => *s.elem = f(&s.elem),
            TypeKind::Optional(base) => **base = f(base),
            TypeKind::Vector(v) => *v.elem = f(&v.elem),
            TypeKind::ErrorUnion(e) => {
                *e.payload = f(&e.payload);
                *e.error = f(&e.error);
            }
            TypeKind::Enum(e) => {
                if let Some(base) = e.base.as_deref_mut() {
                    *base = f(base);
                }
            }
            TypeKind::Union(u) => {
                if let Some(base) = u.base.as_deref_mut() {
                    *base = f(base);
                }
                if let Some(data) = u.data.as_deref_mut() {
                    *data = f(data);
                }
            }
            TypeKind::Function(func) => {
                for arg in &mut func.args {
                    *arg = f(arg);
                }
                *func.ret = f(&func.ret);
            }
            TypeKind::Unsure(types) => {
                for ty in types {
                    *ty = f(ty);
                }
            }
        }
        out
    }

    /// Whether a non-module `Delayed` occurs anywhere in `self`.
    pub fn contains_delayed(&self) -> bool {
        let mut found = false;
        self.accept(&mut |ty: &Self| {
            if matches!(ty.kind, TypeKind::Delayed(_)) && !ty.is_module() {
                found = true;
            }
            !found
        });
        found
    }

    /// Replaces every bound `Delayed` in `self`. Modifiers of the placeholder are
    /// kept on the replacement.
    pub fn substitute(&self, bindings: &Bindings) -> Self {
        if bindings.is_empty() {
            return self.clone();
        }
        match &self.kind {
            TypeKind::Delayed(name) if !self.is_module() => match bindings.get(name) {
                Some(bound) => {
                    let mut out = bound.clone();
                    out.modifiers |= self.modifiers & !Modifiers::COMPTIME;
                    out
                }
                None => self.clone(),
            },
            _ => self.map_children(&mut |child| child.substitute(bindings)),
        }
    }
}
