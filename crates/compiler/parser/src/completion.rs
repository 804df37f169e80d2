//! Classifies what the user is completing from the text in front of the cursor.

/// Completion intent derived from the text before the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionIntent {
    /// Field access on a dotted name chain, e.g. `std.mem.` gives `["std", "mem"]`.
    Field { chain: Vec<String> },
    Unknown,
}

/// Looks at the end of `text_before` and decides whether a field is being completed.
/// A partially typed name after the dot is ignored.
pub fn complete_expr(text_before: &str) -> CompletionIntent {
    let trimmed = text_before.trim_end_matches(is_ident_char);
    let Some(mut rest) = trimmed.strip_suffix('.') else {
        return CompletionIntent::Unknown;
    };
    let mut chain = Vec::new();
    loop {
        let name_start = rest
            .char_indices()
            .rev()
            .take_while(|&(_, c)| is_ident_char(c))
            .last()
            .map_or(rest.len(), |(i, _)| i);
        let name = &rest[name_start..];
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            break;
        }
        chain.push(name.to_string());
        match rest[..name_start].strip_suffix('.') {
            Some(prefix) => rest = prefix,
            None => break,
        }
    }
    if chain.is_empty() {
        return CompletionIntent::Unknown;
    }
    chain.reverse();
    CompletionIntent::Field { chain }
}

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
