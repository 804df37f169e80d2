//! # Ziglens Analyzer
//!
//! Drives the semantic core over a whole project: a [`BackgroundParser`] runs
//! parse jobs on worker threads, follows the imports they request and re-analyzes
//! documents once the imports they waited on are published. The [`commands`]
//! module implements the command line on top of it.

pub mod commands;
pub mod contents;
pub mod scheduler;

pub use contents::{Document, FileContents};
pub use scheduler::{BackgroundParser, SchedulerConfig, DEFAULT_PRIORITY};
