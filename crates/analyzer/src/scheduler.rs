//! Background analysis of documents on a pool of worker threads.
//!
//! Requests are kept in a deduplicated queue keyed by document; a worker picks
//! the most urgent one (lowest priority value, then oldest) whose document is
//! not being analyzed right now. The channel only carries wake-ups, so there is
//! at least one pending [`WorkerMessage::Work`] for every runnable entry.
//!
//! After a document is published, every document whose last analysis waited on
//! an import of it is queued again with [`TopFeatures::RESCHEDULED`]. So are the
//! documents that imported an older result of it, when its declarations changed,
//! and the document itself when an import was republished while it was running.

use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};
use ziglens_compiler_semantic::{
    AnalysisError, DependencyScheduler, DuChain, ParseJob, TopDuContext, TopFeatures,
};
use ziglens_project::Project;

use crate::contents::FileContents;

/// Priority of documents requested directly; lower values run first.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Reschedules of one document by its imports before it waits for a new request.
const MAX_RESCHEDULES: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(8);
        Self { workers }
    }
}

#[derive(Debug)]
enum WorkerMessage {
    Work,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueuedJob {
    priority: i32,
    features: TopFeatures,
    sequence: u64,
}

/// Features of two requests for the same document. Reuse of a published result
/// is only allowed when both requests allow it.
fn merge_features(queued: TopFeatures, requested: TopFeatures) -> TopFeatures {
    let attach = queued & requested & TopFeatures::ATTACH_AST_WITHOUT_UPDATING;
    ((queued | requested) - TopFeatures::ATTACH_AST_WITHOUT_UPDATING) | attach
}

struct RunningJob {
    path: PathBuf,
    queued: QueuedJob,
    abort: Arc<AtomicBool>,
    /// Publication counter when the job was picked
    started: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    queued: FxHashMap<PathBuf, QueuedJob>,
    /// Abort flags of the jobs currently running
    running: FxHashMap<PathBuf, Arc<AtomicBool>>,
    reschedules: FxHashMap<PathBuf, u32>,
    sequence: u64,
    /// Publication counter and the value it had when each document was published
    publications: u64,
    published: FxHashMap<PathBuf, u64>,
    errors: Vec<AnalysisError>,
    shutting_down: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.running.is_empty()
    }

    fn pop_runnable(&mut self) -> Option<(PathBuf, QueuedJob)> {
        let path = self
            .queued
            .iter()
            .filter(|(path, _)| !self.running.contains_key(*path))
            .min_by_key(|(_, job)| (job.priority, job.sequence))
            .map(|(path, _)| path.clone())?;
        let job = self.queued.remove(&path)?;
        Some((path, job))
    }
}

struct Shared {
    chain: Arc<DuChain>,
    project: Arc<Project>,
    contents: Arc<FileContents>,
    state: Mutex<QueueState>,
    idle: Condvar,
    sender: Sender<WorkerMessage>,
    jobs_run: AtomicUsize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wake_worker(&self) {
        if self.sender.send(WorkerMessage::Work).is_err() {
            debug!("No worker left to wake");
        }
    }

    fn enqueue(&self, path: &Path, priority: i32, features: TopFeatures) {
        let mut state = self.state();
        if state.shutting_down {
            return;
        }
        if let Some(queued) = state.queued.get_mut(path) {
            queued.features = merge_features(queued.features, features);
            if priority < queued.priority {
                debug!(
                    "Raising priority of {} from {} to {}",
                    path.display(),
                    queued.priority,
                    priority
                );
                queued.priority = priority;
            } else {
                trace!("{} is already queued", path.display());
            }
            return;
        }
        state.sequence += 1;
        let job = QueuedJob {
            priority,
            features,
            sequence: state.sequence,
        };
        state.queued.insert(path.to_path_buf(), job);
        drop(state);
        debug!("Queued {} at priority {}", path.display(), priority);
        self.wake_worker();
    }

    fn start_next(&self) -> Option<RunningJob> {
        let mut state = self.state();
        let (path, queued) = state.pop_runnable()?;
        let abort = Arc::new(AtomicBool::new(false));
        state.running.insert(path.clone(), Arc::clone(&abort));
        Some(RunningJob {
            path,
            queued,
            abort,
            started: state.publications,
        })
    }

    /// Records the publication of `top` and tells whether one of its imports was
    /// published after the job started.
    fn record_publication(&self, top: &TopDuContext, started: u64) -> bool {
        let mut state = self.state();
        state.publications += 1;
        let publication = state.publications;
        state.published.insert(top.url.clone(), publication);
        top.imports.iter().any(|import| {
            state
                .published
                .get(import)
                .is_some_and(|&published| published > started)
        })
    }

    fn finish(&self, path: &Path) {
        let mut state = self.state();
        state.running.remove(path);
        let queued_again = state.queued.contains_key(path);
        if state.is_idle() {
            self.idle.notify_all();
        }
        drop(state);
        if queued_again {
            self.wake_worker();
        }
    }

    fn record_error(&self, error: AnalysisError) {
        warn!("{error}");
        self.state().errors.push(error);
    }

    fn run(&self, running: RunningJob) {
        let RunningJob {
            path,
            queued,
            abort,
            started,
        } = running;
        let document = match self.contents.read(&path) {
            Ok(document) => document,
            Err(source) => {
                self.record_error(AnalysisError::UnreadableDocument { path, source });
                return;
            }
        };
        self.jobs_run.fetch_add(1, Ordering::Relaxed);
        let previous = self.chain.top_for_path(&path);
        let job = ParseJob::new(&path)
            .with_contents(document.text.to_string())
            .with_revision(document.revision)
            .with_features(queued.features)
            .with_priority(queued.priority)
            .with_abort_flag(abort);

        let outcome = match job.run(&self.chain, &self.project, self) {
            Ok(outcome) => outcome,
            Err(AnalysisError::Aborted(path)) => {
                debug!("Dropped aborted analysis of {}", path.display());
                return;
            }
            Err(error) => {
                self.record_error(error);
                return;
            }
        };

        let mut dependents = outcome.dependents;
        if outcome.reused {
            dependents = self.chain.dependents_of(&path);
            dependents.retain(|dependent| dependent != &path);
        } else {
            if self.record_publication(&outcome.top, started) {
                debug!("An import of {} changed during its analysis", path.display());
                dependents.push(path.clone());
            }
            let changed = previous
                .as_ref()
                .is_some_and(|previous| !previous.same_declarations(&outcome.top));
            if changed {
                dependents.extend(self.chain.importers_of(&path));
            }
        }
        let mut seen = FxHashSet::default();
        dependents.retain(|dependent| seen.insert(dependent.clone()));
        self.reschedule_dependents(&dependents, queued.priority);
    }

    fn reschedule_dependents(&self, dependents: &[PathBuf], priority: i32) {
        for dependent in dependents {
            let count = {
                let mut state = self.state();
                let count = state.reschedules.entry(dependent.clone()).or_default();
                *count += 1;
                *count
            };
            if count > MAX_RESCHEDULES {
                warn!(
                    "{} keeps waiting on its imports, not rescheduling it again",
                    dependent.display()
                );
                continue;
            }
            debug!("Rescheduling dependent {}", dependent.display());
            self.enqueue(
                dependent,
                priority,
                TopFeatures::ALL_DECLARATIONS_CONTEXTS_AND_USES | TopFeatures::RESCHEDULED,
            );
        }
    }
}

impl DependencyScheduler for Shared {
    fn schedule_dependency(&self, document: &Path, priority: i32) {
        self.enqueue(
            document,
            priority,
            TopFeatures::ALL_DECLARATIONS_CONTEXTS_AND_USES
                | TopFeatures::ATTACH_AST_WITHOUT_UPDATING,
        );
    }
}

fn worker_loop(shared: Arc<Shared>, receiver: Receiver<WorkerMessage>) {
    while let Ok(message) = receiver.recv() {
        match message {
            WorkerMessage::Work => {
                let Some(running) = shared.start_next() else {
                    continue;
                };
                let path = running.path.clone();
                shared.run(running);
                shared.finish(&path);
            }
            WorkerMessage::Shutdown => break,
        }
    }
    trace!("Worker stopped");
}

/// Analyzes documents of one project in the background.
pub struct BackgroundParser {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl BackgroundParser {
    pub fn new(project: Arc<Project>, config: SchedulerConfig) -> io::Result<Self> {
        Self::with_chain(Arc::new(DuChain::new()), project, config)
    }

    /// A parser publishing into an existing chain.
    pub fn with_chain(
        chain: Arc<DuChain>,
        project: Arc<Project>,
        config: SchedulerConfig,
    ) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            chain,
            project,
            contents: Arc::new(FileContents::new()),
            state: Mutex::new(QueueState::default()),
            idle: Condvar::new(),
            sender,
            jobs_run: AtomicUsize::new(0),
        });
        let mut parser = Self {
            shared,
            workers: Vec::new(),
        };
        for index in 0..config.workers.max(1) {
            let shared = Arc::clone(&parser.shared);
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("ziglens-worker-{index}"))
                .spawn(move || worker_loop(shared, receiver))?;
            parser.workers.push(handle);
        }
        debug!("Started {} analysis workers", parser.workers.len());
        Ok(parser)
    }

    pub fn chain(&self) -> &Arc<DuChain> {
        &self.shared.chain
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.shared.project
    }

    pub fn contents(&self) -> &Arc<FileContents> {
        &self.shared.contents
    }

    /// Queues a full analysis of `path`.
    pub fn schedule(&self, path: &Path, priority: i32) {
        self.shared.state().reschedules.remove(path);
        self.shared
            .enqueue(path, priority, TopFeatures::ALL_DECLARATIONS_CONTEXTS_AND_USES);
    }

    /// Stores new contents for `path`, aborts its running analysis and queues a
    /// new one.
    pub fn update(&self, path: &Path, text: impl Into<Arc<str>>) -> u64 {
        let document = self.shared.contents.set(path, text);
        self.abort(path);
        self.schedule(path, DEFAULT_PRIORITY);
        document.revision
    }

    /// Drops the queued request for `path` and aborts its running analysis.
    pub fn abort(&self, path: &Path) {
        let mut state = self.shared.state();
        if state.queued.remove(path).is_some() {
            debug!("Removed {} from the queue", path.display());
        }
        if let Some(flag) = state.running.get(path) {
            flag.store(true, Ordering::Relaxed);
        }
        if state.is_idle() {
            self.shared.idle.notify_all();
        }
    }

    pub fn is_idle(&self) -> bool {
        self.shared.state().is_idle()
    }

    /// Blocks until nothing is queued or running.
    pub fn wait_idle(&self) {
        let state = self.shared.state();
        let _state = self
            .shared
            .idle
            .wait_while(state, |state| !state.is_idle())
            .unwrap_or_else(|e| e.into_inner());
    }

    /// Number of jobs started so far.
    pub fn jobs_run(&self) -> usize {
        self.shared.jobs_run.load(Ordering::Relaxed)
    }

    /// Failures of jobs since the last call, aborted jobs excluded.
    pub fn take_errors(&self) -> Vec<AnalysisError> {
        std::mem::take(&mut self.shared.state().errors)
    }
}

impl DependencyScheduler for BackgroundParser {
    fn schedule_dependency(&self, document: &Path, priority: i32) {
        self.shared.schedule_dependency(document, priority);
    }
}

impl Drop for BackgroundParser {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state();
            state.shutting_down = true;
            state.queued.clear();
            for flag in state.running.values() {
                flag.store(true, Ordering::Relaxed);
            }
        }
        for _ in &self.workers {
            let _ = self.shared.sender.send(WorkerMessage::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Analysis worker panicked");
            }
        }
    }
}
