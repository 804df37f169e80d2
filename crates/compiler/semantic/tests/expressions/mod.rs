//! # Expression Tests

mod folding;
