//! # Import Tests

mod multi_file;
