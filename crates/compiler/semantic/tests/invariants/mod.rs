//! # Invariant Tests

mod build_order;
mod properties;
