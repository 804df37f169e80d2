//! Comptime folding of literal operands.

use ziglens_compiler_parser::NodeTag;

/// Value of an integer literal: decimal, `0x`, `0o` or `0b`, `_` separators
/// allowed.
pub fn parse_int(text: &str) -> Option<i128> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    let (negative, digits) = match clean.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, clean.as_str()),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = digits.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -value } else { value })
}

pub fn parse_float(text: &str) -> Option<f64> {
    let clean: String = text.chars().filter(|&c| c != '_').collect();
    clean
        .parse::<f64>()
        .ok()
        .or_else(|| parse_int(&clean).map(|v| v as f64))
}

/// Whether a number literal denotes a float.
pub fn is_float_literal(text: &str) -> bool {
    if text.starts_with("0x") {
        return text.contains('.') || text.contains('p') || text.contains('P');
    }
    text.contains('.') || text.contains('e') || text.contains('E')
}

pub fn fold_int(tag: NodeTag, lhs: i128, rhs: i128) -> Option<i128> {
    match tag {
        NodeTag::Add | NodeTag::AddWrap | NodeTag::AddSat => lhs.checked_add(rhs),
        NodeTag::Sub | NodeTag::SubWrap | NodeTag::SubSat => lhs.checked_sub(rhs),
        NodeTag::Mul | NodeTag::MulWrap | NodeTag::MulSat => lhs.checked_mul(rhs),
        NodeTag::Div => lhs.checked_div(rhs),
        NodeTag::Mod => lhs.checked_rem_euclid(rhs),
        NodeTag::Shl | NodeTag::ShlSat => {
            u32::try_from(rhs).ok().and_then(|s| lhs.checked_shl(s))
        }
        NodeTag::Shr => u32::try_from(rhs).ok().and_then(|s| lhs.checked_shr(s)),
        NodeTag::BitAnd => Some(lhs & rhs),
        NodeTag::BitOr => Some(lhs | rhs),
        NodeTag::BitXor => Some(lhs ^ rhs),
        _ => None,
    }
}

pub fn fold_float(tag: NodeTag, lhs: f64, rhs: f64) -> Option<f64> {
    let value = match tag {
        NodeTag::Add => lhs + rhs,
        NodeTag::Sub => lhs - rhs,
        NodeTag::Mul => lhs * rhs,
        NodeTag::Div if rhs != 0.0 => lhs / rhs,
        NodeTag::Mod if rhs != 0.0 => lhs.rem_euclid(rhs),
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Folds a comparison of two comptime values. Numbers compare numerically,
/// anything else only by equality.
pub fn fold_compare(tag: NodeTag, lhs: &str, rhs: &str) -> Option<bool> {
    let ordering = match (parse_int(lhs), parse_int(rhs)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => match (parse_float(lhs), parse_float(rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    match (tag, ordering) {
        (NodeTag::EqualEqual, Some(o)) => Some(o.is_eq()),
        (NodeTag::BangEqual, Some(o)) => Some(o.is_ne()),
        (NodeTag::EqualEqual, None) => Some(lhs == rhs),
        (NodeTag::BangEqual, None) => Some(lhs != rhs),
        (NodeTag::LessThan, Some(o)) => Some(o.is_lt()),
        (NodeTag::GreaterThan, Some(o)) => Some(o.is_gt()),
        (NodeTag::LessOrEqual, Some(o)) => Some(o.is_le()),
        (NodeTag::GreaterOrEqual, Some(o)) => Some(o.is_ge()),
        _ => None,
    }
}

/// Range of a `bits`-wide integer.
pub fn fits(value: i128, bits: u32, signed: bool) -> bool {
    if bits == 0 {
        return value == 0;
    }
    if bits >= 127 {
        return signed || value >= 0;
    }
    if signed {
        let half = 1i128 << (bits - 1);
        (-half..half).contains(&value)
    } else {
        (0..(1i128 << bits)).contains(&value)
    }
}

pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
