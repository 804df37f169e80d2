//! # Diagnostic Tests

mod problems;
