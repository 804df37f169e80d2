//! Assignability, type comparison helpers and branch merging.

use super::{Modifiers, Type, TypeKind};
use crate::builders::fold;

/// `T` in `*T` on both sides, then compared ignoring modifiers.
pub fn base_types_equal(a: &Type, b: &Type) -> bool {
    types_equal_ignoring_modifiers(a.through_pointer(), b.through_pointer())
}

/// Structural equality after giving `b` the modifiers of `a`.
pub fn types_equal_ignoring_modifiers(a: &Type, b: &Type) -> bool {
    let mut b = b.clone();
    b.modifiers = a.modifiers;
    a.equals_ignoring_value(&b)
}

/// Types the analyzer cannot reason about never produce a mismatch.
fn is_indeterminate(ty: &Type) -> bool {
    matches!(
        ty.kind,
        TypeKind::Unknown | TypeKind::Delayed(_) | TypeKind::Unsure(_)
    ) || ty.is_builtin("anytype")
}

fn integer_widens(target: &Type, value: &Type) -> bool {
    let (Some(t), Some(v)) = (target.builtin_name(), value.builtin_name()) else {
        return false;
    };
    // Target-dependent widths only match themselves.
    let fixed = |name: &str| !matches!(name, "usize" | "isize" | "c_long" | "c_ulong");
    if !fixed(t) || !fixed(v) {
        return t == v;
    }
    let (Some(t_bits), Some(v_bits)) = (target.bitsize(64), value.bitsize(64)) else {
        return false;
    };
    match (target.is_signed(), value.is_signed()) {
        (true, true) | (false, false) => t_bits >= v_bits,
        (true, false) => t_bits > v_bits,
        (false, true) => false,
    }
}

/// A comptime-known sized integer narrows into `target` when its value fits.
fn comptime_value_fits(target: &Type, value: &Type) -> bool {
    let (Some(number), Some(bits)) = (
        value.value_str().and_then(fold::parse_int),
        target.bitsize(64),
    ) else {
        return false;
    };
    fold::fits(number, bits, target.is_signed())
}

/// Whether a value of type `value` may be stored in a location of type `target`.
/// Unknown, delayed and unsure types on either side are accepted.
pub fn can_type_be_assigned(target: &Type, value: &Type) -> bool {
    if is_indeterminate(target) || is_indeterminate(value) {
        return true;
    }
    if matches!(
        value.builtin_name(),
        Some("undefined" | "noreturn" | "trap" | "unreachable")
    ) {
        return true;
    }
    if target.equals_ignoring_value(value) {
        return true;
    }

    match (&target.kind, &value.kind) {
        (TypeKind::Optional(t), TypeKind::Optional(v)) => can_type_be_assigned(t, v),
        (TypeKind::Optional(_), _) if value.is_builtin("null") => true,
        (TypeKind::Optional(t), _) => can_type_be_assigned(t, value),

        (TypeKind::Pointer(t), TypeKind::Pointer(v)) => {
            let const_ok = target.modifiers.contains(Modifiers::CONST)
                || !value.modifiers.contains(Modifiers::CONST);
            let shape = Modifiers::ARRAY_POINTER;
            const_ok
                && target.modifiers & shape == value.modifiers & shape
                && types_equal_ignoring_modifiers(&t.base, &v.base)
        }

        (TypeKind::Slice(t), TypeKind::Pointer(v)) if t.dimension == 0 => match &v.base.kind {
            TypeKind::Slice(inner) => {
                let const_ok = target.modifiers.contains(Modifiers::CONST)
                    || !value.modifiers.contains(Modifiers::CONST);
                const_ok && types_equal_ignoring_modifiers(&t.elem, &inner.elem)
            }
            _ => false,
        },
        (TypeKind::Slice(t), TypeKind::Slice(v)) => {
            (t.dimension == 0 || t.dimension == v.dimension)
                && types_equal_ignoring_modifiers(&t.elem, &v.elem)
        }

        (TypeKind::ErrorUnion(t), TypeKind::ErrorUnion(v)) => {
            can_type_be_assigned(&t.payload, &v.payload)
        }
        (TypeKind::ErrorUnion(_), _) if value.is_error_set() => true,
        (TypeKind::ErrorUnion(t), _) => can_type_be_assigned(&t.payload, value),

        (TypeKind::Enum(t), TypeKind::Enum(v)) => {
            t.decl == v.decl || (target.is_error_set() && value.is_error_set())
        }
        (TypeKind::Builtin(_), TypeKind::Enum(_)) if target.is_builtin("anyerror") => {
            value.is_error_set()
        }
        (TypeKind::Union(t), TypeKind::Union(v)) => t.decl == v.decl,
        (TypeKind::Structure(t), TypeKind::Structure(v)) => t.decl == v.decl,
        (TypeKind::Function(t), TypeKind::Function(v)) => {
            t.args.len() == v.args.len()
                && t.args
                    .iter()
                    .zip(&v.args)
                    .all(|(a, b)| types_equal_ignoring_modifiers(a, b))
                && types_equal_ignoring_modifiers(&t.ret, &v.ret)
        }
        (TypeKind::Vector(t), TypeKind::Vector(v)) => {
            t.dimension == v.dimension && types_equal_ignoring_modifiers(&t.elem, &v.elem)
        }

        (TypeKind::Builtin(t), _) => match t.as_str() {
            "type" => !matches!(value.builtin_name(), Some("null")),
            _ if target.is_float() => {
                value.is_builtin("comptime_int")
                    || value.is_builtin("comptime_float")
                    || (value.is_float()
                        && target.bitsize(64) >= value.bitsize(64)
                        && !target.is_builtin("comptime_float"))
            }
            _ if target.is_integer() => {
                value.is_builtin("comptime_int")
                    || (value.is_integer() && comptime_value_fits(target, value))
                    || integer_widens(target, value)
            }
            _ => types_equal_ignoring_modifiers(target, value),
        },

        _ => false,
    }
}

fn is_divergent(ty: &Type) -> bool {
    matches!(
        ty.builtin_name(),
        Some("noreturn" | "trap" | "unreachable")
    )
}

/// Common type of two branches: `a` when both agree, a generalization when one
/// exists (value dropped, integer over `comptime_int`, optional over `null`),
/// else an unsure placeholder holding both.
pub fn merge_types(a: &Type, b: &Type) -> Type {
    if a.equals_ignoring_value(b) {
        return if a.comptime_value == b.comptime_value {
            a.clone()
        } else {
            a.clone().without_value()
        };
    }
    if is_divergent(a) || a.is_unknown() {
        return b.clone();
    }
    if is_divergent(b) || b.is_unknown() {
        return a.clone();
    }
    if types_equal_ignoring_modifiers(a, b) {
        return a.clone().without_value();
    }
    if a.is_builtin("comptime_int") && b.is_integer() {
        return b.clone().without_value();
    }
    if b.is_builtin("comptime_int") && a.is_integer() {
        return a.clone().without_value();
    }
    match (&a.kind, &b.kind) {
        (TypeKind::Optional(_), _) if b.is_builtin("null") => return a.clone(),
        (_, TypeKind::Optional(_)) if a.is_builtin("null") => return b.clone(),
        _ if b.is_builtin("null") => return Type::optional(a.clone().without_value()),
        _ if a.is_builtin("null") => return Type::optional(b.clone().without_value()),
        _ => {}
    }

    let mut members: Vec<Type> = Vec::new();
    for ty in [a, b] {
        let parts = match &ty.kind {
            TypeKind::Unsure(inner) => inner.clone(),
            _ => vec![ty.clone()],
        };
        for part in parts {
            if !members.iter().any(|m| m.equals_ignoring_value(&part)) {
                members.push(part.without_value());
            }
        }
    }
    TypeKind::Unsure(members).into()
}
