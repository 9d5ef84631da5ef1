//! Change watcher for the temperature file.
//!
//! Turns raw filesystem notifications into a single ordered stream of
//! settled [`WatchEvent`]s:
//!
//! ```text
//! notify (parent dir) ─┐
//!                      ├─> Settler (stability window) ─> mpsc<WatchEvent>
//! poll interval tick ──┘
//! ```
//!
//! The parent directory is watched rather than the file itself so that
//! creation, editor write-then-rename, and removal are all observed even
//! when the file does not exist yet. Each poll tick stats the file, which
//! both drives the stability check and catches changes the platform
//! notifier missed. If the notifier cannot be started the watcher keeps
//! working on polling alone.

mod settle;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use settle::{Fingerprint, Probe, Settler};

use crate::observe::SharedObserver;

/// Capacity of the settled-event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shortest probe period the driver will tick at.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// What happened to the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    /// The file appeared, or already existed at startup.
    Created,
    /// The file's content changed and has since settled.
    Modified,
    /// The file was removed.
    Removed,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Modified => f.write_str("modified"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// A settled change notification. Consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened.
    pub kind: WatchEventKind,
    /// The watched path.
    pub path: PathBuf,
    /// When the watcher emitted the event.
    pub observed_at: DateTime<Utc>,
}

/// Timing parameters for the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Quiet period after the last observed write before a change settles.
    pub stability_threshold: Duration,
    /// How often the file is probed while watching.
    pub poll_interval: Duration,
}

impl WatcherConfig {
    /// Poll interval used for the probe ticker, never zero.
    pub fn tick_period(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_threshold: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Failures of the underlying observation mechanism.
///
/// These are reported to the observer and never end the watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform notifier failed to start or reported an error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// The file could not be inspected for a reason other than absence.
    #[error("failed to stat {path}: {source}")]
    Stat {
        /// The watched path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Control handle for a running watcher.
#[derive(Debug)]
pub struct WatchHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop observing. Calling this more than once has no further effect.
    ///
    /// A change still waiting to settle is dropped without being emitted,
    /// and the event stream ends.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Token that fires when the watcher is stopped.
    ///
    /// The pipeline uses it to discard reads that finish after a stop.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Wait for the watcher task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Watcher task panicked");
        }
    }
}

/// Spawns the watch task for a single file.
pub struct FileWatcher {
    path: PathBuf,
    file_name: Option<OsString>,
    config: WatcherConfig,
    observer: SharedObserver,
    events: mpsc::Sender<WatchEvent>,
    stop: CancellationToken,
}

impl FileWatcher {
    /// Start watching `path`.
    ///
    /// Returns the control handle and the ordered stream of settled
    /// events. Must be called from within a Tokio runtime.
    pub fn spawn(
        path: impl Into<PathBuf>,
        config: WatcherConfig,
        observer: SharedObserver,
    ) -> (WatchHandle, mpsc::Receiver<WatchEvent>) {
        let path = path.into();
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stop = CancellationToken::new();

        let watcher = Self {
            file_name: path.file_name().map(ToOwned::to_owned),
            path,
            config,
            observer,
            events,
            stop: stop.clone(),
        };

        let task = tokio::spawn(watcher.run());
        (WatchHandle { stop, task }, rx)
    }

    async fn run(self) {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
        // Dropping the notifier at the end of this function stops it.
        let _notifier = match self.start_notifier(raw_tx) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                self.observer.watch_failed(&e.to_string());
                None
            }
        };

        let mut settler = Settler::new(self.config.stability_threshold);
        if let Some(probe) = self.probe().await
            && let Some(kind) = settler.prime(probe)
            && !self.emit(kind).await
        {
            return;
        }

        let mut ticker = tokio::time::interval(self.config.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let keep_going = tokio::select! {
                biased;
                () = self.stop.cancelled() => false,
                Some(raw) = raw_rx.recv() => match raw {
                    Ok(event) if self.is_relevant(&event) => {
                        settler.activity(Instant::now());
                        self.check(&mut settler).await
                    }
                    Ok(_) => true,
                    Err(e) => {
                        self.observer.watch_failed(&WatchError::from(e).to_string());
                        true
                    }
                },
                _ = ticker.tick() => self.check(&mut settler).await,
            };
            if !keep_going {
                break;
            }
        }

        debug!(path = %self.path.display(), "Watcher stopped");
    }

    fn start_notifier(
        &self,
        raw_tx: mpsc::UnboundedSender<notify::Result<notify::Event>>,
    ) -> Result<RecommendedWatcher, WatchError> {
        let mut notifier = notify::recommended_watcher(move |res| {
            // The receiver only disappears once the watch task has ended.
            let _ = raw_tx.send(res);
        })?;
        notifier.watch(watch_root(&self.path), RecursiveMode::NonRecursive)?;
        Ok(notifier)
    }

    /// Whether a raw notification concerns the watched file's content.
    fn is_relevant(&self, event: &notify::Event) -> bool {
        let kind_matters = match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => true,
            EventKind::Modify(modify) => {
                !matches!(modify, notify::event::ModifyKind::Metadata(_))
            }
            EventKind::Access(_) | EventKind::Other => false,
        };
        kind_matters
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == self.file_name.as_deref())
    }

    /// Probe the file and feed the settler. Returns `false` once the
    /// watcher should shut down.
    async fn check(&self, settler: &mut Settler) -> bool {
        let Some(probe) = self.probe().await else {
            return true;
        };
        if self.stop.is_cancelled() {
            return false;
        }
        match settler.probe(probe, Instant::now()) {
            Some(kind) => self.emit(kind).await,
            None => true,
        }
    }

    async fn probe(&self) -> Option<Probe> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Some(Probe::Present(Fingerprint::from_metadata(&metadata))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(Probe::Missing),
            Err(source) => {
                let err = WatchError::Stat {
                    path: self.path.clone(),
                    source,
                };
                self.observer.watch_failed(&err.to_string());
                None
            }
        }
    }

    async fn emit(&self, kind: WatchEventKind) -> bool {
        self.observer.event_settled(kind, &self.path);
        let event = WatchEvent {
            kind,
            path: self.path.clone(),
            observed_at: Utc::now(),
        };
        self.events.send(event).await.is_ok()
    }
}

/// Directory to register with the platform notifier.
fn watch_root(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
