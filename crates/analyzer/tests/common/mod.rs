//! Shared fixtures for the analyzer tests: on-disk projects and parsers over them.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use ziglens_analyzer::commands::{load_project, resolve_document};
use ziglens_analyzer::{BackgroundParser, SchedulerConfig};

pub struct Fixture {
    pub dir: TempDir,
    pub parser: BackgroundParser,
}

impl Fixture {
    /// A project of `files` analyzed by `workers` threads, without a standard
    /// library.
    pub fn new(files: &[(&str, &str)], workers: usize) -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("project directory");
            }
            fs::write(&path, content).expect("project file");
        }
        let root = resolve_document(dir.path()).expect("project root");
        let project = load_project(&root, None).expect("project");
        project.set_std_dir(None);
        let parser = BackgroundParser::new(Arc::new(project), SchedulerConfig { workers })
            .expect("analysis threads");
        Self { dir, parser }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        resolve_document(&self.dir.path().join(name)).expect("fixture file exists")
    }

    /// Rendered type of the only declaration called `name` in `file`.
    #[track_caller]
    pub fn type_of(&self, file: &str, name: &str) -> String {
        let top = self
            .parser
            .chain()
            .top_for_path(&self.path(file))
            .unwrap_or_else(|| panic!("{file} was not analyzed"));
        let decls: Vec<_> = top
            .declarations
            .iter()
            .filter(|d| d.identifier.as_str() == name)
            .collect();
        assert_eq!(decls.len(), 1, "declarations named '{name}' in {file}");
        decls[0].ty.to_string()
    }
}
