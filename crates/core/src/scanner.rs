//! Directory scanner and pipeline orchestrator.
//!
//! The scanner polls the watched directory on a fixed interval (and once immediately at start),
//! claims every new eligible file in its [`FileTracker`] and spawns an independent pipeline for
//! it. Pipelines run concurrently on the same runtime and report their terminal state back
//! through the scanner's `JoinSet`, so the tracker is only ever touched from the scan loop.
//!
//! Concurrency is unbounded unless the configuration caps it; see
//! [`PipelineContext`](crate::pipeline::PipelineContext).

use crate::config::AgentConfig;
use crate::metadata::{extension_of, WatchedFile};
use crate::pipeline::{run_pipeline, PipelineContext, PipelineOutcome};
use crate::tracker::{FileTracker, TrackerCounts};
use crate::{AgentError, AgentResult};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

/// What one poll tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// The watched directory was missing and has been created; nothing was listed.
    pub created_dir: bool,
    /// Filenames dispatched on this tick.
    pub dispatched: Vec<String>,
}

/// Regular files directly inside `dir` whose extension is allowed, sorted by path.
///
/// Symlinks are followed, directories are skipped whatever their name.
pub fn matching_files(dir: &Path, config: &AgentConfig) -> AgentResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(AgentError::WatchDirRead)? {
        let entry = entry.map_err(AgentError::WatchDirRead)?;
        let path = entry.path();
        if !config.is_allowed_extension(&extension_of(&path)) {
            continue;
        }
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::debug!("skipping {}: {}", path.display(), e),
        }
    }
    files.sort();
    Ok(files)
}

pub struct Scanner {
    config: AgentConfig,
    ctx: Arc<PipelineContext>,
    tracker: FileTracker,
    tasks: JoinSet<PipelineOutcome>,
}

impl Scanner {
    pub fn new(config: AgentConfig, ctx: Arc<PipelineContext>) -> Self {
        Self {
            config,
            ctx,
            tracker: FileTracker::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn tracker(&self) -> &FileTracker {
        &self.tracker
    }

    pub fn counts(&self) -> TrackerCounts {
        self.tracker.counts()
    }

    /// Number of spawned pipelines whose outcome has not been collected yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Run one poll tick: list the directory and dispatch every unclaimed eligible file.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`AgentError::WatchDirCreation`] or [`AgentError::WatchDirRead`]; the tick is abandoned
    /// and the next one starts from scratch.
    pub fn scan_once(&mut self) -> AgentResult<ScanReport> {
        let dir = self.config.watch_dir().to_path_buf();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(AgentError::WatchDirCreation)?;
            tracing::info!("Created watched folder: {}", dir.display());
            return Ok(ScanReport {
                created_dir: true,
                dispatched: Vec::new(),
            });
        }

        let mut report = ScanReport::default();
        for path in matching_files(&dir, &self.config)? {
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.tracker.contains(filename) {
                continue;
            }

            let file = match WatchedFile::discover(path.clone()) {
                Ok(file) => file,
                Err(e) => {
                    tracing::debug!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if self.tracker.claim(&file.filename) {
                report.dispatched.push(file.filename.clone());
                self.tasks.spawn(run_pipeline(self.ctx.clone(), file));
            }
        }

        Ok(report)
    }

    fn tick(&mut self) {
        match self.scan_once() {
            Ok(report) if !report.dispatched.is_empty() => {
                tracing::info!(
                    "Dispatched {} file(s); {}",
                    report.dispatched.len(),
                    self.tracker.counts()
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Error reading folder: {}", e),
        }
    }

    fn collect(&mut self, result: Result<PipelineOutcome, JoinError>) {
        match result {
            Ok(outcome) => {
                tracing::debug!("{} finished: {}", outcome.filename, outcome.state);
                self.tracker.finish(&outcome.filename, outcome.state);
            }
            Err(e) => tracing::error!("Pipeline task ended abnormally: {}", e),
        }
    }

    /// Poll until `shutdown` resolves.
    ///
    /// Pipelines still running at shutdown are abandoned, not awaited.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(
                        "Stopping agent; {} upload(s) abandoned; {}",
                        self.tasks.len(),
                        self.tracker.counts()
                    );
                    self.tasks.abort_all();
                    break;
                }
                _ = interval.tick() => self.tick(),
                Some(result) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.collect(result);
                }
            }
        }
    }
}
