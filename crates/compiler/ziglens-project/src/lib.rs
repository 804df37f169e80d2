//! Project model: configuration, package table, std-lib discovery and the path
//! rules used to resolve `@import` and to qualify module names.

mod config;
mod discovery;
mod error;
mod project;
mod zig_env;

pub use config::{ProjectConfig, MANIFEST_FILE_NAME};
pub use discovery::discover_project;
pub use error::ProjectError;
pub use project::Project;
pub use zig_env::parse_std_dir;
