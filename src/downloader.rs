//! Download coordinator: owns the output file and the parts, runs one
//! worker per part, and turns their outcomes into a terminal status.

use chrono::{DateTime, Local};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::output::OutputFile;
use crate::part::{Part, PartWorker};
use crate::plan::plan;
use crate::probe::{probe, Resource};
use crate::state::{ProgressSnapshot, Status};

/// Entry point: holds the configuration and the shared HTTP client.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = config.build_client()?;
        Self::with_client(config, client)
    }

    pub fn with_client(config: DownloadConfig, client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Probes `url`, plans the parts and creates the output file.
    ///
    /// Nothing is written to disk when the probe fails. `filename` overrides
    /// the name suggested by the server.
    pub async fn initialize(&self, url: &str, filename: Option<PathBuf>) -> Result<Download> {
        let url = Url::parse(url)
            .map_err(|e| DownloadError::usage(format!("invalid URL {url:?}: {e}")))?;

        let resource = probe(&self.client, url, self.config.headers.clone(), filename).await?;
        let ranges = plan(resource.size, self.config.workers)?;

        let path = match &self.config.output_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| DownloadError::file_io(dir, e))?;
                dir.join(&resource.filename)
            }
            None => resource.filename.clone(),
        };
        let file = OutputFile::create(&path)?;

        let parts: Vec<Part> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| Part::new(index, range))
            .collect();

        info!(
            url = %resource.url,
            size = resource.size,
            path = %path.display(),
            parts = parts.len(),
            "download initialized"
        );

        Ok(Download::new(
            resource,
            path,
            parts,
            file,
            self.client.clone(),
            &self.config,
        ))
    }
}

enum Phase {
    Ready,
    Running(JoinSet<Result<()>>),
    Finished,
}

/// One initialized download. Single-shot: `start` once, then `wait` once.
pub struct Download {
    resource: Resource,
    path: PathBuf,
    parts: Vec<Part>,
    client: Client,
    buffer_size: usize,
    stall_timeout: Option<Duration>,
    file: Option<Arc<OutputFile>>,
    cancel: CancellationToken,
    status: watch::Sender<Status>,
    tracker: ProgressTracker,
    phase: Phase,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
}

impl Download {
    fn new(
        resource: Resource,
        path: PathBuf,
        parts: Vec<Part>,
        file: OutputFile,
        client: Client,
        config: &DownloadConfig,
    ) -> Self {
        let (status, status_rx) = watch::channel(Status::NotStarted);
        let tracker = ProgressTracker {
            total: resource.size,
            parts: parts.clone().into(),
            status: status_rx,
            clock: Arc::new(Clock::default()),
        };

        Self {
            resource,
            path,
            parts,
            client,
            buffer_size: config.buffer_size,
            stall_timeout: config.stall_timeout,
            file: Some(Arc::new(file)),
            cancel: CancellationToken::new(),
            status,
            tracker,
            phase: Phase::Ready,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.resource.url
    }

    pub fn size(&self) -> u64 {
        self.resource.size
    }

    /// Where the output is written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &Path {
        &self.resource.filename
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn worker_count(&self) -> usize {
        self.parts.len()
    }

    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// A handle for polling progress from another task while `wait` runs.
    pub fn tracker(&self) -> ProgressTracker {
        self.tracker.clone()
    }

    /// Spawns one worker per part. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.phase, Phase::Ready) {
            return Err(DownloadError::usage("download already started"));
        }
        let file = self
            .file
            .clone()
            .ok_or_else(|| DownloadError::usage("output file already released"))?;

        self.tracker.clock.start();
        self.started_at = Some(Local::now());
        self.status.send_if_modified(|s| s.advance(Status::InProgress));

        let mut tasks = JoinSet::new();
        for part in &self.parts {
            let worker = PartWorker {
                part: part.clone(),
                client: self.client.clone(),
                url: self.resource.url.clone(),
                headers: self.resource.headers.clone(),
                file: file.clone(),
                cancel: self.cancel.clone(),
                buffer_size: self.buffer_size,
                stall_timeout: self.stall_timeout,
            };
            tasks.spawn(worker.run());
        }
        self.phase = Phase::Running(tasks);

        info!(url = %self.resource.url, workers = self.parts.len(), "download started");
        Ok(())
    }

    /// Waits for every worker and returns the first error, if any.
    ///
    /// The first error cancels the remaining workers and becomes the terminal
    /// status. The output file is released on every path.
    pub async fn wait(&mut self) -> Result<()> {
        let mut tasks = match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::Running(tasks) => tasks,
            Phase::Ready => {
                self.phase = Phase::Ready;
                return Err(DownloadError::usage("wait called before start"));
            }
            Phase::Finished => return Err(DownloadError::usage("download already waited on")),
        };

        let mut first_error: Option<DownloadError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome =
                joined.unwrap_or_else(|e| Err(DownloadError::WorkerPanicked(e.to_string())));
            let Err(err) = outcome else { continue };

            if first_error.is_some() {
                debug!(error = %err, "discarding error after failure");
                continue;
            }
            warn!(error = %err, "part failed, cancelling the rest");
            self.fail(&err);
            self.cancel.cancel();
            first_error = Some(err);
        }

        let result = match first_error {
            Some(err) => Err(err),
            None => self.check_complete(),
        };
        let closed = self.release_file();
        let result = result.and(closed);

        self.tracker.clock.finish();
        self.finished_at = Some(Local::now());
        match &result {
            Ok(()) => {
                self.status.send_if_modified(|s| s.advance(Status::Completed));
                info!(
                    path = %self.path.display(),
                    elapsed = ?self.snapshot().elapsed,
                    "download completed"
                );
            }
            Err(err) => self.fail(err),
        }
        result
    }

    /// `start` followed by `wait`.
    pub async fn run(&mut self) -> Result<()> {
        self.start()?;
        self.wait().await
    }

    fn fail(&self, err: &DownloadError) {
        self.status
            .send_if_modified(|s| s.advance(Status::Failed(err.to_string())));
    }

    fn check_complete(&self) -> Result<()> {
        match self.parts.iter().find(|p| !p.is_complete()) {
            Some(part) => Err(DownloadError::Incomplete {
                part: part.index,
                missing: part.size() - part.downloaded(),
            }),
            None => Ok(()),
        }
    }

    fn release_file(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        debug!(path = %self.path.display(), "releasing output file");
        match Arc::try_unwrap(file) {
            Ok(file) => file.close(),
            // a detached worker still holds a clone; it closes when that drops
            Err(shared) => shared.sync(),
        }
    }
}

#[derive(Debug, Default)]
struct Clock {
    started: OnceLock<Instant>,
    finished: OnceLock<Instant>,
}

impl Clock {
    fn start(&self) {
        let _ = self.started.set(Instant::now());
    }

    fn finish(&self) {
        let _ = self.finished.set(Instant::now());
    }

    fn elapsed(&self) -> Duration {
        match self.started.get() {
            Some(start) => {
                let end = self.finished.get().copied().unwrap_or_else(Instant::now);
                end.saturating_duration_since(*start)
            }
            None => Duration::ZERO,
        }
    }
}

/// Cheap, cloneable view of a download's progress.
///
/// Reads the per-part counters without locking, so a snapshot taken while
/// workers run may be off by whatever is in flight.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u64,
    parts: Arc<[Part]>,
    status: watch::Receiver<Status>,
    clock: Arc<Clock>,
}

impl ProgressTracker {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status.borrow().clone(),
            total: self.total,
            downloaded: self.parts.iter().map(Part::downloaded).sum(),
            elapsed: self.clock.elapsed(),
        }
    }

    /// `(downloaded, size)` for each part, in index order.
    pub fn part_progress(&self) -> Vec<(u64, u64)> {
        self.parts.iter().map(|p| (p.downloaded(), p.size())).collect()
    }
}
