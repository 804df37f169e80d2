//! # Parser Tests
//!
//! - `parser/toplevel.rs` - declarations, containers, tests, `usingnamespace`
//! - `parser/expressions.rs` - operators, calls, initializers, builtins
//! - `parser/types.rs` - pointer, slice, array, optional and error-union types
//! - `parser/statements.rs` - control flow, captures, labels, error recovery

pub mod common;
mod parser;
