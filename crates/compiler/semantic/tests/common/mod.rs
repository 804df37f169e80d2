//! Common test utilities for semantic analysis tests
//!
//! This module contains the shared test infrastructure:
//! - Single-document analysis of inline code
//! - On-disk multi-file projects driven by a queueing scheduler
//! - Declaration lookup helpers
//! - Problem formatting and assertion helpers

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use tempfile::TempDir;
use ziglens_compiler_diagnostics::{build_problem_message, Position, ProblemCode};
use ziglens_compiler_semantic::{
    analyze_source, complete, CompletionItem, ContextId, DeclId, Declaration, DependencyScheduler,
    DuChain, DuContext, Identifier, JobOutcome, ParseJob, TopDuContext,
};
use ziglens_project::{Project, ProjectConfig};

// ===== Single Document Analysis =====

/// Directory of the documents analyzed from inline code.
pub const VIRTUAL_ROOT: &str = "/virtual";

/// `/virtual/<test>.zig` for a fully qualified test function name.
pub fn document_path(function_name: &str) -> PathBuf {
    let name = function_name.rsplit("::").next().unwrap_or(function_name);
    Path::new(VIRTUAL_ROOT).join(format!("{name}.zig"))
}

/// A project rooted at [`VIRTUAL_ROOT`] that never looks for a standard library.
pub fn virtual_project() -> Arc<Project> {
    let project = Project::detached(PathBuf::from(VIRTUAL_ROOT));
    project.set_std_dir(None);
    Arc::new(project)
}

/// One analyzed document together with the chain it was published to.
pub struct Analyzed {
    pub chain: DuChain,
    pub project: Arc<Project>,
    pub top: Arc<TopDuContext>,
    pub source: String,
}

impl Analyzed {
    /// The only declaration called `name`.
    #[track_caller]
    pub fn decl(&self, name: &str) -> &Declaration {
        find_decl(&self.top, name)
    }

    /// Every declaration called `name`, in creation order.
    pub fn decls_named(&self, name: &str) -> Vec<&Declaration> {
        decls_named(&self.top, name)
    }

    /// Rendered type of the only declaration called `name`.
    #[track_caller]
    pub fn type_of(&self, name: &str) -> String {
        self.decl(name).ty.to_string()
    }

    /// Scope the only declaration called `name` is declared in.
    #[track_caller]
    pub fn scope_of(&self, name: &str) -> &DuContext {
        let decl = self.decl(name);
        self.top
            .context(decl.context)
            .unwrap_or_else(|| panic!("declaration '{name}' has no context"))
    }

    /// Body scope of the only declaration called `name`.
    #[track_caller]
    pub fn body_of(&self, name: &str) -> &DuContext {
        let decl = self.decl(name);
        decl.internal_context
            .and_then(|ctx| self.top.context(ctx))
            .unwrap_or_else(|| panic!("declaration '{name}' has no body"))
    }

    /// Identifiers declared in `ctx`, in order.
    pub fn names_in(&self, ctx: &DuContext) -> Vec<&'static str> {
        names_in(&self.top, ctx)
    }

    pub fn problem_codes(&self) -> Vec<ProblemCode> {
        self.top.problems.iter().map(|p| p.code).collect()
    }

    pub fn render_problems(&self) -> String {
        self.top
            .problems
            .iter()
            .map(|p| build_problem_message(&self.source, p, false))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Completion items for a cursor placed right after the first occurrence
    /// of `needle` in the source.
    #[track_caller]
    pub fn complete_after(&self, needle: &str) -> Vec<CompletionItem> {
        complete_after(&self.chain, &self.top, &self.source, needle)
    }
}

#[track_caller]
pub fn analyze_impl(code: &str, function_name: &str) -> Analyzed {
    let project = virtual_project();
    let chain = DuChain::new();
    let top = analyze_source(&chain, &project, document_path(function_name), code)
        .unwrap_or_else(|e| panic!("{function_name}: analysis failed: {e}"));
    Analyzed {
        chain,
        project,
        top,
        source: code.to_string(),
    }
}

/// Analyzes `code` and panics with the rendered problems if there are any.
#[track_caller]
pub fn assert_semantic_ok_impl(code: &str, function_name: &str) -> Analyzed {
    let analyzed = analyze_impl(code, function_name);
    if !analyzed.top.problems.is_empty() {
        panic!(
            "{function_name}: expected no problems, got:\n{}",
            analyzed.render_problems()
        );
    }
    analyzed
}

/// Analyzes `code` and asserts the codes of its problems.
#[track_caller]
pub fn assert_semantic_problems_impl(
    code: &str,
    function_name: &str,
    expected: &[ProblemCode],
) -> Analyzed {
    let analyzed = analyze_impl(code, function_name);
    let codes = analyzed.problem_codes();
    if codes != expected {
        panic!(
            "{function_name}: expected problems {expected:?}, got {codes:?}:\n{}",
            analyzed.render_problems()
        );
    }
    analyzed
}

// ===== Declaration Lookup =====

pub fn decls_named<'a>(top: &'a TopDuContext, name: &str) -> Vec<&'a Declaration> {
    let name = Identifier::new(name);
    top.declarations
        .iter()
        .filter(|d| d.identifier == name)
        .collect()
}

#[track_caller]
pub fn find_decl<'a>(top: &'a TopDuContext, name: &str) -> &'a Declaration {
    match decls_named(top, name).as_slice() {
        [decl] => *decl,
        [] => panic!("no declaration named '{name}' in\n{}", top.dump()),
        many => panic!(
            "{} declarations named '{name}' in\n{}",
            many.len(),
            top.dump()
        ),
    }
}

pub fn names_in(top: &TopDuContext, ctx: &DuContext) -> Vec<&'static str> {
    ctx.declarations
        .iter()
        .filter_map(|&id| top.declaration(id))
        .map(|d| d.identifier.as_str())
        .collect()
}

/// Id of the only declaration called `name`.
#[track_caller]
pub fn decl_id(top: &TopDuContext, name: &str) -> DeclId {
    let name_id = Identifier::new(name);
    let ids: Vec<DeclId> = top
        .declarations
        .iter_enumerated()
        .filter(|(_, d)| d.identifier == name_id)
        .map(|(id, _)| id)
        .collect();
    match ids.as_slice() {
        [id] => *id,
        _ => panic!("expected one declaration named '{name}', found {}", ids.len()),
    }
}

/// Scopes from `ctx` up to the root.
pub fn ancestry(top: &TopDuContext, ctx: ContextId) -> Vec<ContextId> {
    top.ancestors(ctx).collect()
}

// ===== Completion =====

/// Position right after the first occurrence of `needle` in `source`, with the
/// text of that line up to the position.
#[track_caller]
pub fn cursor_after<'s>(source: &'s str, needle: &str) -> (Position, &'s str) {
    let offset = source
        .find(needle)
        .map(|start| start + needle.len())
        .unwrap_or_else(|| panic!("'{needle}' not found in source"));
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = source[..offset].matches('\n').count();
    let position = Position::new(line as u32, (offset - line_start) as u32);
    (position, &source[line_start..offset])
}

#[track_caller]
pub fn complete_after(
    chain: &DuChain,
    top: &TopDuContext,
    source: &str,
    needle: &str,
) -> Vec<CompletionItem> {
    let (position, text_before) = cursor_after(source, needle);
    complete(chain, top, text_before, position)
}

pub fn item_names(items: &[CompletionItem]) -> Vec<&str> {
    items.iter().map(|item| item.name.as_str()).collect()
}

// ===== Multi-File Projects =====

/// Scheduler that queues requested documents for [`TestProject::run_until_idle`].
#[derive(Debug, Default)]
pub struct QueueScheduler {
    queue: Mutex<VecDeque<PathBuf>>,
}

impl QueueScheduler {
    pub fn push(&self, document: &Path) {
        let mut queue = self.queue.lock().unwrap();
        if !queue.iter().any(|queued| queued == document) {
            queue.push_back(document.to_path_buf());
        }
    }

    pub fn pop(&self) -> Option<PathBuf> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn pending(&self) -> Vec<PathBuf> {
        self.queue.lock().unwrap().iter().cloned().collect()
    }
}

impl DependencyScheduler for QueueScheduler {
    fn schedule_dependency(&self, document: &Path, _priority: i32) {
        self.push(document);
    }
}

/// Upper bound on jobs per [`TestProject::run_until_idle`] call.
const MAX_JOBS: usize = 64;

/// Source files written to a temporary directory and analyzed from disk.
pub struct TestProject {
    pub dir: TempDir,
    pub project: Arc<Project>,
    pub chain: DuChain,
    pub scheduler: QueueScheduler,
}

impl TestProject {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::create(files, None).expect("failed to create test project")
    }

    /// A project configured by `manifest`, the content of `ziglens.toml`.
    pub fn with_manifest(manifest: &str, files: &[(&str, &str)]) -> Self {
        Self::create(files, Some(manifest)).expect("failed to create test project")
    }

    fn create(files: &[(&str, &str)], manifest: Option<&str>) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir().context("creating project directory")?;
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        }
        let config = match manifest {
            Some(manifest) => ProjectConfig::from_file_content(manifest)?,
            None => ProjectConfig::default(),
        };
        let project = Project::new(dir.path().to_path_buf(), config);
        project.set_std_dir(None);
        Ok(Self {
            dir,
            project: Arc::new(project),
            chain: DuChain::new(),
            scheduler: QueueScheduler::default(),
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn source(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).expect("test source is readable")
    }

    /// Runs one job for `name`; dependencies it requests are queued.
    #[track_caller]
    pub fn run(&self, name: &str) -> JobOutcome {
        self.run_path(&self.path(name))
    }

    #[track_caller]
    fn run_path(&self, path: &Path) -> JobOutcome {
        ParseJob::new(path)
            .run(&self.chain, &self.project, &self.scheduler)
            .unwrap_or_else(|e| panic!("analysis of {} failed: {e}", path.display()))
    }

    /// Analyzes `name`, then every queued dependency and every dependent that
    /// was waiting on a published file, until nothing is left. Returns the number
    /// of jobs run.
    #[track_caller]
    pub fn run_until_idle(&self, name: &str) -> usize {
        self.scheduler.push(&self.path(name));
        let mut jobs = 0;
        while let Some(path) = self.scheduler.pop() {
            jobs += 1;
            assert!(jobs <= MAX_JOBS, "analysis did not settle after {MAX_JOBS} jobs");
            let outcome = self.run_path(&path);
            for dependent in &outcome.dependents {
                self.scheduler.push(dependent);
            }
        }
        jobs
    }

    /// Published top context of `name`.
    #[track_caller]
    pub fn top(&self, name: &str) -> Arc<TopDuContext> {
        self.chain
            .top_for_path(&self.path(name))
            .unwrap_or_else(|| panic!("{name} was not analyzed"))
    }

    #[track_caller]
    pub fn type_of(&self, file: &str, name: &str) -> String {
        find_decl(&self.top(file), name).ty.to_string()
    }
}
