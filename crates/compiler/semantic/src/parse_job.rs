//! # Parse Job
//!
//! One analysis of one document: parse, two declaration passes, the use pass,
//! then publication of the new top context.
//!
//! The job builds into a private [`TopDuContext`] and only touches the shared
//! [`DuChain`] to read other files and to publish at the very end, so an aborted
//! or panicking job leaves the previous result of its document in place.
//! Dependencies discovered while building are handed to the
//! [`DependencyScheduler`] after publication, outside of any chain lock.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, trace_span};
use ziglens_compiler_diagnostics::Problem;
use ziglens_project::Project;

use crate::builders::{declarations, uses};
use crate::duchain::{DuChain, TopDuContext, TopFeatures};
use crate::session::ParseSession;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Cannot read {}: {source}", path.display())]
    UnreadableDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Analysis of {} was aborted", .0.display())]
    Aborted(PathBuf),
    #[error("{} is not a registered file", .0.display())]
    UnknownFile(PathBuf),
    #[error("Analysis of {} panicked: {message}", path.display())]
    Panicked { path: PathBuf, message: String },
}

/// Receives requests to analyze a document another document depends on.
pub trait DependencyScheduler: Send + Sync {
    /// Asks for `document` to be analyzed at `priority` or better. Requests for
    /// an already queued document at an equal or better priority are ignored.
    fn schedule_dependency(&self, document: &Path, priority: i32);
}

/// A scheduler that drops every request, for one-shot analyses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScheduler;

impl DependencyScheduler for NoScheduler {
    fn schedule_dependency(&self, _document: &Path, _priority: i32) {}
}

#[derive(Debug)]
pub struct JobOutcome {
    pub top: Arc<TopDuContext>,
    /// Documents waiting on an import of this one
    pub dependents: Vec<PathBuf>,
    /// The published result was reused without analyzing
    pub reused: bool,
}

#[derive(Debug, Clone)]
pub struct ParseJob {
    document: PathBuf,
    contents: Option<String>,
    revision: u64,
    features: TopFeatures,
    priority: i32,
    abort: Arc<AtomicBool>,
}

impl ParseJob {
    pub fn new(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            contents: None,
            revision: 0,
            features: TopFeatures::ALL_DECLARATIONS_CONTEXTS_AND_USES,
            priority: 0,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Analyzes `contents` instead of reading the document from disk.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub const fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_features(mut self, features: TopFeatures) -> Self {
        self.features = features;
        self
    }

    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub const fn priority(&self) -> i32 {
        self.priority
    }

    pub const fn features(&self) -> TopFeatures {
        self.features
    }

    /// Flag checked between the phases of [`ParseJob::run`].
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    fn check_abort(&self) -> Result<(), AnalysisError> {
        if self.abort.load(Ordering::Relaxed) {
            debug!("Aborting analysis of {}", self.document.display());
            return Err(AnalysisError::Aborted(self.document.clone()));
        }
        Ok(())
    }

    fn read_source(&self) -> Result<String, AnalysisError> {
        match &self.contents {
            Some(contents) => Ok(contents.clone()),
            None => std::fs::read_to_string(&self.document).map_err(|source| {
                AnalysisError::UnreadableDocument {
                    path: self.document.clone(),
                    source,
                }
            }),
        }
    }

    pub fn run(
        &self,
        chain: &DuChain,
        project: &Arc<Project>,
        scheduler: &dyn DependencyScheduler,
    ) -> Result<JobOutcome, AnalysisError> {
        let _span = trace_span!("parse_job", document = %self.document.display()).entered();
        let lock = chain.url_lock(&self.document);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let file = chain.register_file(&self.document);
        if self.features.contains(TopFeatures::ATTACH_AST_WITHOUT_UPDATING) {
            if let Some(top) = chain.top(file).filter(|top| top.revision == self.revision) {
                debug!(
                    "Reusing revision {} of {}",
                    self.revision,
                    self.document.display()
                );
                return Ok(JobOutcome {
                    top,
                    dependents: Vec::new(),
                    reused: true,
                });
            }
        }

        let source = self.read_source()?;
        let mut session = ParseSession::new(
            self.document.clone(),
            source,
            file,
            self.revision,
            Arc::clone(project),
        );
        session.priority = self.priority;

        match panic::catch_unwind(AssertUnwindSafe(|| self.build(&mut session, chain))) {
            Ok(result) => result?,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "Analysis of {} panicked: {}",
                    self.document.display(),
                    message
                );
                return Err(AnalysisError::Panicked {
                    path: self.document.clone(),
                    message,
                });
            }
        }
        self.check_abort()?;

        let ast = session.parse();
        let file_path = self.document.to_string_lossy().into_owned();
        let parser_problems: Vec<Problem> = ast
            .errors()
            .iter()
            .map(|e| {
                Problem::parser(e.severity, e.message.clone())
                    .with_location(e.span, e.range)
                    .with_file(file_path.clone())
            })
            .collect();
        let pending = std::mem::take(&mut session.tables.pending_schedules);

        let mut top = session.finish();
        top.problems.extend(parser_problems);
        top.problems.sort();
        top.features = (self.features | TopFeatures::ALL_DECLARATIONS_CONTEXTS_AND_USES)
            - TopFeatures::ATTACH_AST_WITHOUT_UPDATING;
        for import in &top.unresolved_imports {
            debug!(
                "{} waits on unresolved import {}",
                self.document.display(),
                import.display()
            );
        }

        let top = {
            let _span = trace_span!("publish").entered();
            chain.publish(top)
        };

        for (path, priority) in pending {
            debug!("Scheduling dependency {} at {}", path.display(), priority);
            scheduler.schedule_dependency(&path, priority);
        }
        let dependents = chain
            .dependents_of(&self.document)
            .into_iter()
            .filter(|path| path != &self.document)
            .collect();
        Ok(JobOutcome {
            top,
            dependents,
            reused: false,
        })
    }

    fn build(&self, session: &mut ParseSession, chain: &DuChain) -> Result<(), AnalysisError> {
        {
            let _span = trace_span!("parse").entered();
            session.parse();
        }
        self.check_abort()?;
        {
            let _span = trace_span!("prebuild").entered();
            declarations::build(session, chain, true);
        }
        {
            let _span = trace_span!("build").entered();
            declarations::build(session, chain, false);
        }
        self.check_abort()?;
        {
            let _span = trace_span!("uses").entered();
            uses::build(session, chain);
        }
        self.check_abort()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Analyzes `document` from `contents` without scheduling dependencies.
pub fn analyze_source(
    chain: &DuChain,
    project: &Arc<Project>,
    document: impl Into<PathBuf>,
    contents: impl Into<String>,
) -> Result<Arc<TopDuContext>, AnalysisError> {
    ParseJob::new(document)
        .with_contents(contents)
        .run(chain, project, &NoScheduler)
        .map(|outcome| outcome.top)
}
