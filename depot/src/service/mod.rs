//! Download coordinator: one serialized queue, single-flight execution.
//!
//! [`DownloadService`] owns the task queue and the at-most-one active
//! transfer, drives each task through fetch → validate → promote/discard,
//! and broadcasts every state transition. Enqueue and cancel are cheap
//! synchronous calls from any thread; the fetch/validate pipeline runs on
//! the Tokio runtime the service was created in.
//!
//! # Per-task state machine
//!
//! ```text
//! Pending ──► Connecting ──► Downloading* ──► Success
//!                                        ├──► Error
//!                                        └──► Cancelled
//! ```
//!
//! `Pending` is skipped when the queue is idle. `Cancelled` is reachable
//! from any non-terminal state. Exactly one terminal event is emitted per
//! task instance: every lifecycle event is published while holding the
//! scheduler lock, and a pipeline whose run was cancelled or replaced
//! mid-flight finds its run id stale and stays silent.
//!
//! # Example
//!
//! ```ignore
//! use depot::{DownloadService, ServiceConfig};
//!
//! let service = DownloadService::new(ServiceConfig::new("cache"))?;
//! let mut events = service.subscribe();
//!
//! service.enqueue("com.example.app", "Example", release);
//! while let Ok(event) = events.recv().await {
//!     println!("{}: {}", event.package, event.state.name());
//!     if event.state.is_terminal() {
//!         break;
//!     }
//! }
//! ```

mod queue;

pub use queue::TaskQueue;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ArtifactCache;
use crate::config::ServiceConfig;
use crate::events::StateBroadcaster;
use crate::fetch::{FetchRequest, Fetcher, HttpFetcher, ProgressSink, TransportResult};
use crate::release::{ReleaseDescriptor, Task};
use crate::state::{ErrorKind, TaskEvent, TaskState};
use crate::validate::{self, ValidationError};

/// Host process lifecycle signal.
///
/// `Active` while a download is running or queued work exists; `Idle` once
/// the queue empties with no active run. A hosting process can start and
/// stop a foreground execution context off this signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Idle,
    Active,
}

/// Receives the verified artifact after a successful download.
///
/// The service's responsibility ends at this call; installation itself is
/// an external concern.
pub trait InstallHandoff: Send + Sync + 'static {
    fn install(&self, package: &str, artifact: &Path);
}

/// Handoff that does nothing, for hosts that act on the event stream only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstaller;

impl InstallHandoff for NoopInstaller {
    fn install(&self, _package: &str, _artifact: &Path) {}
}

/// Errors that can occur while constructing the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("service must be created inside a Tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// The single in-flight download.
struct ActiveRun {
    task: Task,
    cancel: CancellationToken,
    run_id: u64,
    last_state: TaskState,
}

/// Queue and active run, guarded by one mutex.
struct SchedulerState {
    queue: TaskQueue,
    active: Option<ActiveRun>,
    next_run_id: u64,
    started: bool,
}

/// How a pipeline run ended, reported back to the scheduler.
enum RunOutcome {
    Verified,
    Failed(ErrorKind),
    Cancelled,
}

struct ServiceInner {
    state: Mutex<SchedulerState>,
    events: StateBroadcaster,
    cache: ArtifactCache,
    fetcher: Arc<dyn Fetcher>,
    installer: Arc<dyn InstallHandoff>,
    status_tx: watch::Sender<ServiceStatus>,
    runtime: Handle,
}

impl ServiceInner {
    /// Publishes a lifecycle event. Callers emitting for a live task hold
    /// the scheduler lock so events stay totally ordered per task.
    fn emit(&self, task: &Task, state: TaskState) {
        match &state {
            TaskState::Error { kind } => {
                warn!(package = %task.package, error = %kind, "download failed");
            }
            _ => debug!(package = %task.package, state = state.name(), "state change"),
        }
        self.events.publish(TaskEvent {
            package: task.package.clone(),
            display_name: task.display_name.clone(),
            state,
        });
    }
}

/// The download coordinator.
///
/// Cheap to clone; all clones share one queue, cache and event stream.
#[derive(Clone)]
pub struct DownloadService {
    inner: Arc<ServiceInner>,
}

impl DownloadService {
    /// Creates a service downloading over HTTP with no install handoff.
    ///
    /// Must be called inside a Tokio runtime; the service keeps a handle to
    /// it for pipeline execution.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_parts(config, Arc::new(fetcher), Arc::new(NoopInstaller))
    }

    /// Creates a service downloading over HTTP with the given handoff.
    pub fn with_installer(
        config: ServiceConfig,
        installer: Arc<dyn InstallHandoff>,
    ) -> Result<Self, ServiceError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_parts(config, Arc::new(fetcher), installer)
    }

    /// Creates a service from explicit parts. Tests inject a scripted
    /// fetcher here.
    pub fn with_parts(
        config: ServiceConfig,
        fetcher: Arc<dyn Fetcher>,
        installer: Arc<dyn InstallHandoff>,
    ) -> Result<Self, ServiceError> {
        let runtime = Handle::try_current()?;
        let (status_tx, _) = watch::channel(ServiceStatus::Idle);

        Ok(Self {
            inner: Arc::new(ServiceInner {
                state: Mutex::new(SchedulerState {
                    queue: TaskQueue::new(),
                    active: None,
                    next_run_id: 0,
                    started: false,
                }),
                events: StateBroadcaster::new(config.event_capacity),
                cache: ArtifactCache::new(config.cache_dir.clone()),
                fetcher,
                installer,
                status_tx,
                runtime,
            }),
        })
    }

    /// Requests a download for `package`.
    ///
    /// Idempotent per package with latest-call-wins semantics: any queued
    /// or in-flight instance of the same package is cancelled first and
    /// emits exactly one `Cancelled`. If the verified artifact is already
    /// cached, this short-circuits to `Success` without network access.
    pub fn enqueue(
        &self,
        package: impl Into<String>,
        display_name: impl Into<String>,
        release: ReleaseDescriptor,
    ) {
        let task = Task::new(package, display_name, release);

        if self.inner.cache.contains(&task.release.cache_file_name) {
            info!(package = %task.package, "artifact already cached, skipping download");
            self.inner.emit(
                &task,
                TaskState::Success {
                    release: task.release.clone(),
                },
            );
            self.inner.installer.install(
                &task.package,
                &self.inner.cache.final_path(&task.release.cache_file_name),
            );
            return;
        }

        {
            let mut state = self.inner.state.lock();
            for superseded in state.queue.remove(&task.package) {
                self.inner.emit(&superseded, TaskState::Cancelled);
            }
            self.cancel_active_locked(&mut state, &task.package);
            state.queue.push(task.clone());
            if state.active.is_some() {
                self.inner.emit(&task, TaskState::Pending);
                return;
            }
        }
        self.drain();
    }

    /// Cancels any queued or in-flight download for `package`.
    pub fn cancel(&self, package: &str) {
        {
            let mut state = self.inner.state.lock();
            for removed in state.queue.remove(package) {
                self.inner.emit(&removed, TaskState::Cancelled);
            }
            self.cancel_active_locked(&mut state, package);
        }
        self.drain();
    }

    /// Cancels everything: queued tasks and the active run.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        for task in state.queue.drain_all() {
            self.inner.emit(&task, TaskState::Cancelled);
        }
        if let Some(run) = state.active.take() {
            self.inner.emit(&run.task, TaskState::Cancelled);
            run.cancel.cancel();
        }
        if state.started {
            state.started = false;
            self.inner.status_tx.send_replace(ServiceStatus::Idle);
            info!("download service idle");
        }
    }

    /// Subscribes to the state event stream.
    ///
    /// The receiver observes events published after this call; dropping it
    /// unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    /// Watches the host lifecycle signal.
    pub fn status(&self) -> watch::Receiver<ServiceStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Package and last published state of the in-flight download, if any.
    pub fn current(&self) -> Option<(String, TaskState)> {
        let state = self.inner.state.lock();
        state
            .active
            .as_ref()
            .map(|run| (run.task.package.clone(), run.last_state.clone()))
    }

    /// The artifact cache this service promotes into.
    pub fn cache(&self) -> &ArtifactCache {
        &self.inner.cache
    }

    /// Cancels the active run if it matches `package`. Caller holds the lock.
    fn cancel_active_locked(&self, state: &mut SchedulerState, package: &str) {
        let matches = state
            .active
            .as_ref()
            .is_some_and(|run| run.task.package == package);
        if matches {
            if let Some(run) = state.active.take() {
                self.inner.emit(&run.task, TaskState::Cancelled);
                run.cancel.cancel();
            }
        }
    }

    /// Starts the head of the queue if no run is active; signals idle when
    /// the queue empties.
    fn drain(&self) {
        let started_task = {
            let mut state = self.inner.state.lock();
            if state.active.is_some() {
                None
            } else if let Some(task) = state.queue.pop() {
                let run_id = state.next_run_id;
                state.next_run_id += 1;
                let cancel = CancellationToken::new();
                state.active = Some(ActiveRun {
                    task: task.clone(),
                    cancel: cancel.clone(),
                    run_id,
                    last_state: TaskState::Connecting,
                });
                if !state.started {
                    state.started = true;
                    self.inner.status_tx.send_replace(ServiceStatus::Active);
                    info!("download service active");
                }
                self.inner.emit(&task, TaskState::Connecting);
                Some((task, cancel, run_id))
            } else {
                if state.started {
                    state.started = false;
                    self.inner.status_tx.send_replace(ServiceStatus::Idle);
                    info!("download service idle");
                }
                None
            }
        };

        if let Some((task, cancel, run_id)) = started_task {
            let service = self.clone();
            self.inner
                .runtime
                .spawn(async move { service.run_pipeline(task, cancel, run_id).await });
        }
    }

    /// Fetches and validates one task, then reports back to the scheduler.
    async fn run_pipeline(self, task: Task, cancel: CancellationToken, run_id: u64) {
        let staging = match self
            .inner
            .cache
            .prepare_staging(&task.release.cache_file_name)
        {
            Ok(path) => path,
            Err(err) => {
                warn!(package = %task.package, error = %err, "failed to prepare staging file");
                self.finish(run_id, &task, RunOutcome::Failed(ErrorKind::Network));
                return;
            }
        };

        let progress_service = self.clone();
        let progress_task = task.clone();
        let progress: ProgressSink = Box::new(move |read, total| {
            progress_service.publish_progress(run_id, &progress_task, read, total);
        });

        let request = FetchRequest {
            url: task.release.url.clone(),
            destination: staging.clone(),
            auth_token: task.release.auth_token.clone(),
        };

        let transport = self.inner.fetcher.fetch(request, progress, cancel).await;

        let outcome = match transport {
            TransportResult::Complete => {
                let release = task.release.clone();
                let verdict =
                    tokio::task::spawn_blocking(move || validate::validate(&staging, &release))
                        .await;
                match verdict {
                    Ok(Ok(())) => RunOutcome::Verified,
                    Ok(Err(error)) => RunOutcome::Failed(ErrorKind::Validation(error)),
                    Err(err) => {
                        // A crashed validation counts as a failed digest
                        // computation.
                        warn!(package = %task.package, error = %err, "validation aborted");
                        RunOutcome::Failed(ErrorKind::Validation(ValidationError::Integrity))
                    }
                }
            }
            TransportResult::HttpStatus(status) => RunOutcome::Failed(ErrorKind::Http { status }),
            TransportResult::Network(reason) => {
                warn!(package = %task.package, %reason, "transfer failed");
                RunOutcome::Failed(ErrorKind::Network)
            }
            TransportResult::Cancelled => RunOutcome::Cancelled,
        };

        self.finish(run_id, &task, outcome);
    }

    /// Applies a pipeline outcome: promote or discard the staging file,
    /// emit the terminal event, clear the active slot and advance.
    ///
    /// A stale `run_id` means the run was cancelled or replaced while in
    /// flight; its terminal event was already emitted by the cancelling
    /// caller, so the result is dropped.
    fn finish(&self, run_id: u64, task: &Task, outcome: RunOutcome) {
        let name = task.release.cache_file_name.as_str();
        let mut handoff: Option<PathBuf> = None;
        {
            let mut state = self.inner.state.lock();
            let current = matches!(&state.active, Some(run) if run.run_id == run_id);
            if !current {
                // The staging path may already belong to a replacement run
                // of the same package; only discard when unclaimed.
                let claimed = state
                    .active
                    .as_ref()
                    .is_some_and(|run| run.task.release.cache_file_name == name);
                if !claimed {
                    self.inner.cache.discard(name);
                }
                debug!(package = %task.package, run_id, "stale run result dropped");
            } else {
                state.active = None;
                match outcome {
                    RunOutcome::Verified => match self.inner.cache.promote(name) {
                        Ok(path) => {
                            info!(
                                package = %task.package,
                                artifact = %path.display(),
                                "download verified"
                            );
                            self.inner.emit(
                                task,
                                TaskState::Success {
                                    release: task.release.clone(),
                                },
                            );
                            handoff = Some(path);
                        }
                        Err(err) => {
                            warn!(package = %task.package, error = %err, "failed to promote artifact");
                            self.inner.cache.discard(name);
                            self.inner.emit(
                                task,
                                TaskState::Error {
                                    kind: ErrorKind::Network,
                                },
                            );
                        }
                    },
                    RunOutcome::Failed(kind) => {
                        self.inner.cache.discard(name);
                        self.inner.emit(task, TaskState::Error { kind });
                    }
                    RunOutcome::Cancelled => {
                        self.inner.cache.discard(name);
                        self.inner.emit(task, TaskState::Cancelled);
                    }
                }
            }
        }
        if let Some(path) = handoff {
            self.inner.installer.install(&task.package, &path);
        }
        self.drain();
    }

    /// Publishes a `Downloading` tick for a live run; stale runs and runs
    /// past their terminal state are silently dropped.
    fn publish_progress(&self, run_id: u64, task: &Task, read: u64, total: Option<u64>) {
        let mut state = self.inner.state.lock();
        if let Some(run) = state.active.as_mut() {
            if run.run_id == run_id {
                let snapshot = TaskState::Downloading { read, total };
                run.last_state = snapshot.clone();
                self.inner.emit(task, snapshot);
            }
        }
    }
}
