//! # Scenario Tests

mod end_to_end;
