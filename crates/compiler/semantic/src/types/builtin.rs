//! Builtin type names and their numeric classification.

use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use super::Type;

/// Names that denote builtin types. Arbitrary-width integers (`u3`, `i7`)
/// are recognized separately by [`is_builtin_type_name`].
pub const BUILTIN_TYPE_NAMES: &[&str] = &[
    "void",
    "bool",
    "type",
    "anytype",
    "noreturn",
    "null",
    "undefined",
    "anyframe",
    "frame",
    "anyerror",
    "anyopaque",
    "comptime_int",
    "comptime_float",
    "u8",
    "u16",
    "u32",
    "u64",
    "u128",
    "i8",
    "i16",
    "i32",
    "i64",
    "i128",
    "usize",
    "isize",
    "f16",
    "f32",
    "f64",
    "f80",
    "f128",
    "c_char",
    "c_short",
    "c_ushort",
    "c_int",
    "c_uint",
    "c_long",
    "c_ulong",
    "c_longlong",
    "c_ulonglong",
    "c_longdouble",
    "trap",
    "unreachable",
    "opaque",
    "true",
    "false",
];

/// C ABI integer names: `(name, signed, bits)`; `0` bits means pointer-sized.
const C_INTEGERS: &[(&str, bool, u32)] = &[
    ("c_char", true, 8),
    ("c_short", true, 16),
    ("c_ushort", false, 16),
    ("c_int", true, 32),
    ("c_uint", false, 32),
    ("c_long", true, 0),
    ("c_ulong", false, 0),
    ("c_longlong", true, 64),
    ("c_ulonglong", false, 64),
];

fn width_suffix(name: &str, prefix: char) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn is_builtin_type_name(name: &str) -> bool {
    BUILTIN_TYPE_NAMES.contains(&name)
        || width_suffix(name, 'u').is_some()
        || width_suffix(name, 'i').is_some()
}

pub fn is_unsigned_name(name: &str) -> bool {
    name == "usize"
        || width_suffix(name, 'u').is_some()
        || C_INTEGERS
            .iter()
            .any(|&(c_name, signed, _)| c_name == name && !signed)
}

pub fn is_signed_name(name: &str) -> bool {
    name == "isize"
        || width_suffix(name, 'i').is_some()
        || C_INTEGERS
            .iter()
            .any(|&(c_name, signed, _)| c_name == name && signed)
}

/// Integers of a known width plus `comptime_int`.
pub fn is_integer_name(name: &str) -> bool {
    name == "comptime_int" || is_signed_name(name) || is_unsigned_name(name)
}

pub fn is_float_name(name: &str) -> bool {
    matches!(
        name,
        "f16" | "f32" | "f64" | "f80" | "f128" | "c_longdouble" | "comptime_float"
    )
}

/// Width in bits, or `None` for non-numeric and comptime types.
pub fn bitsize_of(name: &str, ptr_size: u32) -> Option<u32> {
    if name == "usize" || name == "isize" {
        return Some(ptr_size);
    }
    if let Some(&(_, _, bits)) = C_INTEGERS.iter().find(|(c_name, _, _)| *c_name == name) {
        return Some(match bits {
            0 if ptr_size <= 32 => 32,
            0 => 64,
            bits => bits,
        });
    }
    if name == "c_longdouble" {
        return Some(80);
    }
    width_suffix(name, 'u')
        .or_else(|| width_suffix(name, 'i'))
        .or_else(|| width_suffix(name, 'f'))
}

fn cache() -> &'static FxHashMap<&'static str, Type> {
    static CACHE: OnceLock<FxHashMap<&'static str, Type>> = OnceLock::new();
    CACHE.get_or_init(|| {
        BUILTIN_TYPE_NAMES
            .iter()
            .map(|&name| (name, Type::make_builtin(name)))
            .collect()
    })
}

/// `Builtin(name)`, served from a shared cache for the well-known names.
pub fn builtin_type(name: &str) -> Type {
    match cache().get(name) {
        Some(ty) => ty.clone(),
        None => Type::make_builtin(name),
    }
}
