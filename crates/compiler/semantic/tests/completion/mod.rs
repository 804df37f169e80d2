//! # Completion Tests

mod members;
