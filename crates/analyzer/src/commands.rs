//! The `check`, `complete` and `dump` commands.
//!
//! Every command schedules its documents on a [`BackgroundParser`], waits until
//! the queue drains (imports included) and reports from the published results.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{debug, warn};
use ziglens_compiler_diagnostics::{build_problem_message, Position, Severity};
use ziglens_compiler_semantic::{complete as complete_at, AnalysisError, TopDuContext};
use ziglens_project::{discover_project, Project};

use crate::scheduler::{BackgroundParser, DEFAULT_PRIORITY};

/// Absolute form of a document given on the command line.
pub fn resolve_document(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("Cannot open {}", path.display()))
}

/// The project `start` belongs to: the nearest `ziglens.toml` above it, else a
/// project rooted at the directory of `start`.
pub fn load_project(start: &Path, std_dir: Option<PathBuf>) -> anyhow::Result<Project> {
    let project = match discover_project(start)
        .with_context(|| format!("Cannot load the project of {}", start.display()))?
    {
        Some(project) => project,
        None => {
            let root = if start.is_dir() {
                start.to_path_buf()
            } else {
                start.parent().map(Path::to_path_buf).unwrap_or_default()
            };
            debug!("No manifest found, using {} as project root", root.display());
            Project::detached(root)
        }
    };
    if let Some(std_dir) = std_dir {
        project.set_std_dir(Some(std_dir));
    }
    Ok(project)
}

fn error_path(error: &AnalysisError) -> &Path {
    match error {
        AnalysisError::UnreadableDocument { path, .. }
        | AnalysisError::Aborted(path)
        | AnalysisError::UnknownFile(path)
        | AnalysisError::Panicked { path, .. } => path,
    }
}

/// Analyzes `documents` and their imports; fails if one of `documents` could not
/// be analyzed.
fn analyze_all(parser: &BackgroundParser, documents: &[PathBuf]) -> anyhow::Result<()> {
    for document in documents {
        parser.schedule(document, DEFAULT_PRIORITY);
    }
    parser.wait_idle();

    let mut failure = None;
    for error in parser.take_errors() {
        if failure.is_none() && documents.iter().any(|d| d == error_path(&error)) {
            failure = Some(error);
        } else {
            warn!("{error}");
        }
    }
    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn published(parser: &BackgroundParser, document: &Path) -> anyhow::Result<Arc<TopDuContext>> {
    parser
        .chain()
        .top_for_path(document)
        .with_context(|| format!("{} was not analyzed", document.display()))
}

fn source_of(parser: &BackgroundParser, document: &Path) -> anyhow::Result<Arc<str>> {
    parser
        .contents()
        .get(document)
        .map(|document| document.text)
        .with_context(|| format!("No contents for {}", document.display()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub documents: usize,
    pub problems: usize,
    pub errors: usize,
}

/// Prints the problems of every document in `documents`.
pub fn check(
    parser: &BackgroundParser,
    documents: &[PathBuf],
    color: bool,
    out: &mut impl Write,
) -> anyhow::Result<CheckSummary> {
    analyze_all(parser, documents)?;

    let mut summary = CheckSummary::default();
    for document in documents {
        let top = published(parser, document)?;
        let source = source_of(parser, document)?;
        summary.documents += 1;
        for problem in top.problems.iter() {
            summary.problems += 1;
            if problem.severity == Severity::Error {
                summary.errors += 1;
            }
            writeln!(out, "{}", build_problem_message(&source, problem, color))?;
        }
    }
    Ok(summary)
}

/// Prints the completion items at a one-based `line` and `column`, one per line
/// as `name<TAB>kind<TAB>detail`.
pub fn complete(
    parser: &BackgroundParser,
    document: &Path,
    line: u32,
    column: u32,
    out: &mut impl Write,
) -> anyhow::Result<usize> {
    let (Some(line), Some(column)) = (line.checked_sub(1), column.checked_sub(1)) else {
        bail!("Lines and columns start at 1");
    };
    analyze_all(parser, &[document.to_path_buf()])?;
    let top = published(parser, document)?;
    let source = source_of(parser, document)?;

    let text = source
        .lines()
        .nth(line as usize)
        .with_context(|| format!("{} has no line {}", document.display(), line + 1))?;
    let mut end = (column as usize).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    let items = complete_at(parser.chain(), &top, &text[..end], Position::new(line, end as u32));
    for item in &items {
        writeln!(out, "{}\t{:?}\t{}", item.name, item.kind, item.detail)?;
    }
    Ok(items.len())
}

/// Prints the scope tree of `document` with its declarations.
pub fn dump(parser: &BackgroundParser, document: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    analyze_all(parser, &[document.to_path_buf()])?;
    let top = published(parser, document)?;
    write!(out, "{}", top.dump())?;
    Ok(())
}
