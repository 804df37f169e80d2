//! # Semantic Analysis Tests
//!
//! Tests are organized by concern:
//!
//! - `scenarios` - end-to-end examples from source to declarations and types
//! - `declarations/` - scopes, containers, functions and captures built per node
//! - `expressions` - expression types and comptime folding
//! - `diagnostics` - semantic problems and their severities
//! - `imports` - multi-file projects, packages, circular imports
//! - `completion` - member and identifier completion
//! - `invariants` - properties every analyzed file satisfies
//! - `jobs` - parse job lifecycle: reuse, abort, unreadable documents
//!
//! ## Test Utilities
//!
//! - `analyze!(code)` - analyze a single in-memory document
//! - `assert_semantic_ok!(code)` - analyze and assert no problem was reported
//! - `assert_semantic_problems!(code, [codes])` - analyze and assert the problem codes

pub mod common;
pub use common::*;

/// Analyzes inline code as a document named after the calling test
#[macro_export]
macro_rules! analyze {
    ($code:expr) => {{
        let function_name = stdext::function_name!();
        $crate::analyze_impl($code, function_name)
    }};
}

/// Analyzes inline code and asserts that no problem was reported
#[macro_export]
macro_rules! assert_semantic_ok {
    ($code:expr) => {{
        let function_name = stdext::function_name!();
        $crate::assert_semantic_ok_impl($code, function_name)
    }};
}

/// Analyzes inline code and asserts the codes of the reported problems, in
/// source order
#[macro_export]
macro_rules! assert_semantic_problems {
    ($code:expr, [$($problem:expr),* $(,)?]) => {{
        let function_name = stdext::function_name!();
        $crate::assert_semantic_problems_impl($code, function_name, &[$($problem),*])
    }};
}

pub mod completion;
pub mod declarations;
pub mod diagnostics;
pub mod expressions;
pub mod imports;
pub mod invariants;
pub mod scenarios;
