//! # Type System
//!
//! [`Type`] is an immutable value: a [`TypeKind`] variant, a set of [`Modifiers`]
//! and an optional comptime value. Types that name a declaration (structures,
//! enums, unions) refer to it by [`DeclRef`] rather than embedding it, which keeps
//! recursive and cross-file types finite.
//!
//! ## Equality
//!
//! - `==` (derived) is full equality, comptime value included. It agrees with the
//!   derived [`Hash`].
//! - [`Type::equals_ignoring_value`] compares everything but the top-level value.
//!
//! ## Comptime values
//!
//! A type is comptime-known iff it carries a value. The value is an interned
//! string whose meaning depends on the variant: a number literal, `true`/`false`,
//! an enum member name, or the contents of a string.

pub mod assign;
pub mod builtin;
mod substitute;

use std::fmt;

use bitflags::bitflags;

pub use assign::{
    base_types_equal, can_type_be_assigned, merge_types, types_equal_ignoring_modifiers,
};
pub use builtin::{builtin_type, is_builtin_type_name};
pub use substitute::{Bindings, TypeVisitor};

use crate::duchain::DeclRef;
use crate::identifier::Identifier;

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u16 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const COMPTIME = 1 << 2;
        /// Top level of a file
        const MODULE = 1 << 3;
        /// Declarations pulled in from a C header
        const C_INCLUDE = 1 << 4;
        /// Enum root or value that belongs to an error set
        const ERROR_SET = 1 << 5;
        /// Many-item pointer (`[*]T`, `[*c]T`)
        const ARRAY_POINTER = 1 << 6;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PointerType {
    pub base: Box<Type>,
    pub align: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SliceType {
    pub elem: Box<Type>,
    /// `0` for `[]T`
    pub dimension: u64,
    pub sentinel: Option<Identifier>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ErrorUnionType {
    pub payload: Box<Type>,
    pub error: Box<Type>,
}

/// An enum (or error set) root, or one of its values when `enum_type` is set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub decl: DeclRef,
    pub name: Identifier,
    /// Underlying integer type of the root
    pub base: Option<Box<Type>>,
    /// Root type this value belongs to
    pub enum_type: Option<Box<Type>>,
}

/// A union root, or one of its fields when `union_type` is set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UnionType {
    pub decl: DeclRef,
    pub name: Identifier,
    /// Tag type
    pub base: Option<Box<Type>>,
    /// Payload type of a field
    pub data: Option<Box<Type>>,
    pub union_type: Option<Box<Type>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructureType {
    pub decl: DeclRef,
    pub name: Identifier,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub args: Vec<Type>,
    pub ret: Box<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VectorType {
    pub elem: Box<Type>,
    pub dimension: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Nothing could be inferred
    Unknown,
    Builtin(Identifier),
    Pointer(PointerType),
    Slice(SliceType),
    Optional(Box<Type>),
    ErrorUnion(ErrorUnionType),
    Enum(EnumType),
    Union(UnionType),
    Structure(StructureType),
    Function(FunctionType),
    /// Placeholder bound at call sites; with [`Modifiers::MODULE`] it stands for
    /// an import whose target was not analyzed yet.
    Delayed(Identifier),
    Vector(VectorType),
    /// Result of merging types that have no common generalization
    Unsure(Vec<Type>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub comptime_value: Option<Identifier>,
}

impl Default for Type {
    fn default() -> Self {
        Self::unknown()
    }
}

impl From<TypeKind> for Type {
    fn from(kind: TypeKind) -> Self {
        Self {
            kind,
            modifiers: Modifiers::empty(),
            comptime_value: None,
        }
    }
}

// ---- construction ----

impl Type {
    pub fn unknown() -> Self {
        TypeKind::Unknown.into()
    }

    /// `Builtin(name)`. `true`/`false` become a comptime-known `bool`, `null` is
    /// always comptime-known.
    pub fn builtin(name: &str) -> Self {
        builtin::builtin_type(name)
    }

    pub(crate) fn make_builtin(name: &str) -> Self {
        match name {
            "true" | "false" => Self::from(TypeKind::Builtin(Identifier::new("bool")))
                .with_value(Identifier::new(name)),
            "null" => Self::from(TypeKind::Builtin(Identifier::new("null")))
                .with_value(Identifier::new("null")),
            _ => TypeKind::Builtin(Identifier::new(name)).into(),
        }
    }

    pub fn pointer(base: Self) -> Self {
        TypeKind::Pointer(PointerType {
            base: Box::new(base),
            align: None,
        })
        .into()
    }

    pub fn slice(elem: Self, dimension: u64) -> Self {
        TypeKind::Slice(SliceType {
            elem: Box::new(elem),
            dimension,
            sentinel: None,
        })
        .into()
    }

    pub fn optional(base: Self) -> Self {
        TypeKind::Optional(Box::new(base)).into()
    }

    pub fn error_union(payload: Self, error: Self) -> Self {
        TypeKind::ErrorUnion(ErrorUnionType {
            payload: Box::new(payload),
            error: Box::new(error),
        })
        .into()
    }

    pub fn function(args: Vec<Self>, ret: Self) -> Self {
        TypeKind::Function(FunctionType {
            args,
            ret: Box::new(ret),
        })
        .into()
    }

    pub fn structure(decl: DeclRef, name: Identifier) -> Self {
        TypeKind::Structure(StructureType { decl, name }).into()
    }

    pub fn delayed(name: Identifier) -> Self {
        TypeKind::Delayed(name).into()
    }

    pub fn vector(elem: Self, dimension: u64) -> Self {
        TypeKind::Vector(VectorType {
            elem: Box::new(elem),
            dimension,
        })
        .into()
    }

    /// `*const [len:0]u8` carrying `value`, the type of a string literal.
    pub fn string_literal(value: &str) -> Self {
        let mut slice = Self::slice(Self::builtin("u8"), value.len() as u64);
        if let TypeKind::Slice(s) = &mut slice.kind {
            s.sentinel = Some(Identifier::new("0"));
        }
        Self::pointer(slice)
            .with_modifiers(Modifiers::CONST)
            .with_value(Identifier::new(value))
    }

    /// `[:0]const u8`, returned by name-producing builtins.
    pub fn const_string() -> Self {
        let mut slice = Self::slice(Self::builtin("u8"), 0).with_modifiers(Modifiers::CONST);
        if let TypeKind::Slice(s) = &mut slice.kind {
            s.sentinel = Some(Identifier::new("0"));
        }
        slice
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    pub fn with_value(mut self, value: Identifier) -> Self {
        self.comptime_value = (!value.is_empty()).then_some(value);
        self
    }

    pub fn without_value(mut self) -> Self {
        self.comptime_value = None;
        self
    }
}

// ---- queries ----

impl Type {
    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    pub fn is_comptime_known(&self) -> bool {
        self.comptime_value.is_some()
    }

    pub fn value_str(&self) -> Option<&'static str> {
        self.comptime_value.map(Identifier::as_str)
    }

    pub fn builtin_name(&self) -> Option<&'static str> {
        match self.kind {
            TypeKind::Builtin(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin_name() == Some(name)
    }

    pub fn is_integer(&self) -> bool {
        self.builtin_name().is_some_and(builtin::is_integer_name)
    }

    pub fn is_signed(&self) -> bool {
        self.builtin_name().is_some_and(builtin::is_signed_name)
    }

    pub fn is_unsigned(&self) -> bool {
        self.builtin_name().is_some_and(builtin::is_unsigned_name)
    }

    pub fn is_float(&self) -> bool {
        self.builtin_name().is_some_and(builtin::is_float_name)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits of a numeric builtin. `usize`/`isize` use `ptr_size`.
    pub fn bitsize(&self, ptr_size: u32) -> Option<u32> {
        self.builtin_name()
            .and_then(|name| builtin::bitsize_of(name, ptr_size))
    }

    pub fn is_delayed(&self) -> bool {
        matches!(self.kind, TypeKind::Delayed(_))
    }

    pub fn is_module(&self) -> bool {
        self.modifiers.contains(Modifiers::MODULE)
    }

    pub fn is_error_set(&self) -> bool {
        self.modifiers.contains(Modifiers::ERROR_SET) || self.is_builtin("anyerror")
    }

    /// Types whose values the analyzer can track at compile time.
    pub fn supports_comptime_value(&self) -> bool {
        match &self.kind {
            TypeKind::Builtin(name) => !matches!(
                name.as_str(),
                "void" | "noreturn" | "anytype" | "undefined" | "trap" | "unreachable" | "opaque"
            ),
            TypeKind::Enum(_) | TypeKind::Slice(_) => true,
            TypeKind::Pointer(p) => matches!(p.base.kind, TypeKind::Slice(_)),
            TypeKind::Optional(base) => base.supports_comptime_value(),
            _ => false,
        }
    }

    pub fn equals_ignoring_value(&self, other: &Self) -> bool {
        self.kind == other.kind && self.modifiers == other.modifiers
    }

    /// `T` for `*T`, else `self`.
    pub fn through_pointer(&self) -> &Self {
        match &self.kind {
            TypeKind::Pointer(p) => &p.base,
            _ => self,
        }
    }

    /// Payload type of `?T`, also through one pointer.
    pub fn optional_base(&self) -> Option<&Self> {
        match &self.through_pointer().kind {
            TypeKind::Optional(base) => Some(base),
            _ => None,
        }
    }

    /// Element type of an array pointer, slice, array or vector.
    pub fn element(&self) -> Option<&Self> {
        match &self.kind {
            TypeKind::Slice(s) => Some(&s.elem),
            TypeKind::Vector(v) => Some(&v.elem),
            TypeKind::Pointer(p) if self.modifiers.contains(Modifiers::ARRAY_POINTER) => {
                Some(&p.base)
            }
            TypeKind::Pointer(p) => match &p.base.kind {
                TypeKind::Slice(s) => Some(&s.elem),
                TypeKind::Vector(v) => Some(&v.elem),
                _ => None,
            },
            _ => None,
        }
    }

    /// Declaration behind a structure, enum or union type.
    pub fn declaration(&self) -> Option<DeclRef> {
        match &self.kind {
            TypeKind::Structure(s) => Some(s.decl),
            TypeKind::Enum(e) => Some(e.decl),
            TypeKind::Union(u) => Some(u.decl),
            _ => None,
        }
    }

    /// Root enum of an enum value, or the root itself.
    pub fn enum_type(&self) -> Option<&Self> {
        match &self.kind {
            TypeKind::Enum(e) => Some(e.enum_type.as_deref().unwrap_or(self)),
            _ => None,
        }
    }

    /// Value form of an enum root: a copy that links back to the root.
    pub fn as_enum_value(&self, value: Identifier) -> Self {
        match &self.kind {
            TypeKind::Enum(e) if e.enum_type.is_none() => {
                let root = self.clone().without_value();
                let mut value_ty = self.clone();
                if let TypeKind::Enum(v) = &mut value_ty.kind {
                    v.enum_type = Some(Box::new(root));
                }
                value_ty.with_value(value)
            }
            _ => self.clone().with_value(value),
        }
    }

    pub fn function_type(&self) -> Option<&FunctionType> {
        match &self.kind {
            TypeKind::Function(f) => Some(f),
            _ => None,
        }
    }
}

// ---- display ----

impl Type {
    fn fmt_qualifiers(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifiers::CONST) {
            f.write_str("const ")?;
        }
        if self.modifiers.contains(Modifiers::VOLATILE) {
            f.write_str("volatile ")?;
        }
        Ok(())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifiers::COMPTIME) {
            f.write_str("comptime ")?;
        }
        match &self.kind {
            TypeKind::Pointer(p) => {
                f.write_str(if self.modifiers.contains(Modifiers::ARRAY_POINTER) {
                    "[*]"
                } else {
                    "*"
                })?;
                if let Some(align) = p.align {
                    write!(f, "align({align}) ")?;
                }
                self.fmt_qualifiers(f)?;
                write!(f, "{}", p.base)?;
            }
            TypeKind::Slice(s) => {
                f.write_str("[")?;
                if s.dimension > 0 {
                    write!(f, "{}", s.dimension)?;
                }
                if let Some(sentinel) = s.sentinel {
                    write!(f, ":{sentinel}")?;
                }
                f.write_str("]")?;
                self.fmt_qualifiers(f)?;
                write!(f, "{}", s.elem)?;
            }
            kind => {
                self.fmt_qualifiers(f)?;
                match kind {
                    TypeKind::Unknown => f.write_str("unknown")?,
                    TypeKind::Builtin(name) | TypeKind::Delayed(name) => write!(f, "{name}")?,
                    TypeKind::Optional(base) => write!(f, "?{base}")?,
                    TypeKind::ErrorUnion(e) => write!(f, "{}!{}", e.error, e.payload)?,
                    TypeKind::Enum(e) => write!(f, "{}", e.name)?,
                    TypeKind::Union(u) => write!(f, "{}", u.name)?,
                    TypeKind::Structure(s) => write!(f, "{}", s.name)?,
                    TypeKind::Function(func) => {
                        f.write_str("fn (")?;
                        for (i, arg) in func.args.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{arg}")?;
                        }
                        write!(f, ") {}", func.ret)?;
                    }
                    TypeKind::Vector(v) => write!(f, "@Vector({}, {})", v.dimension, v.elem)?,
                    TypeKind::Unsure(types) => {
                        f.write_str("unsure(")?;
                        for (i, ty) in types.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{ty}")?;
                        }
                        f.write_str(")")?;
                    }
                    TypeKind::Pointer(_) | TypeKind::Slice(_) => {}
                }
            }
        }
        match self.comptime_value {
            Some(value) if self.builtin_name() != Some(value.as_str()) => {
                write!(f, " = {value}")
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
