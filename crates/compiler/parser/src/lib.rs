//! # Parser
//!
//! Lexer, recursive-descent parser, and the read-only [`Ast`] facade consumed by
//! semantic analysis. Also hosts the text-based completion-intent helper.

pub mod ast;
pub mod completion;
pub mod lexer;
pub mod line_index;
mod parser;

pub use ast::{
    Ast, AstError, Capture, ContainerData, FnProtoData, ForData, IfData, NodeIndex, NodeKind,
    NodeTag, ParamData, PtrSize, PtrTypeData, SliceData, SubRange, TokenIndex, VisitResult,
    WhileData, INVALID_TOKEN,
};
pub use completion::{complete_expr, CompletionIntent};
pub use lexer::TokenType;
pub use line_index::LineIndex;

/// Parses `source` into a syntax tree named `name` (usually the document path).
/// Syntax errors are reported through [`Ast::error_count`] / [`Ast::error_at`].
pub fn parse_ast(name: &str, source: &str) -> Ast {
    parser::parse(name, source)
}
