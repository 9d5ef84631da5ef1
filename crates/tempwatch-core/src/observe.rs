//! Diagnostics sink for the change-detection pipeline.
//!
//! Every component that would otherwise print to the console reports
//! through a [`PipelineObserver`] instead. Production wiring uses
//! [`TracingObserver`], which turns each report into a structured
//! `tracing` event. Tests inject a [`RecordingObserver`] and assert on
//! the collected [`Diagnostic`] values.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::watcher::WatchEventKind;

/// Receives failure, skip, and progress reports from the pipeline.
///
/// All methods have empty default bodies so implementations only need
/// to override what they care about.
pub trait PipelineObserver: Send + Sync {
    /// A non-blank line did not match the reading grammar and was dropped.
    fn line_skipped(&self, _line: &str) {}

    /// The watched resource could not be read; an empty list was produced.
    fn read_failed(&self, _path: &Path, _error: &std::io::Error) {}

    /// The watch mechanism reported an error. Observation continues.
    fn watch_failed(&self, _error: &str) {}

    /// The watcher emitted a settled event.
    fn event_settled(&self, _kind: WatchEventKind, _path: &Path) {}

    /// A reading list was pushed to the active sessions.
    fn broadcast_sent(&self, _readings: usize, _sessions: usize) {}

    /// The writer replaced the resource with `count` readings.
    fn file_written(&self, _path: &Path, _count: usize) {}
}

/// Shared handle to an observer, as stored in contexts and tasks.
pub type SharedObserver = Arc<dyn PipelineObserver>;

/// Observer that forwards every report to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn line_skipped(&self, line: &str) {
        warn!(line, "Invalid temperature format, line skipped");
    }

    fn read_failed(&self, path: &Path, error: &std::io::Error) {
        error!(path = %path.display(), error = %error, "Error reading temperature file");
    }

    fn watch_failed(&self, error: &str) {
        error!(error, "Watcher error");
    }

    fn event_settled(&self, kind: WatchEventKind, path: &Path) {
        info!(kind = %kind, path = %path.display(), "File event settled");
    }

    fn broadcast_sent(&self, readings: usize, sessions: usize) {
        info!(readings, sessions, "Emitted temperatures to clients");
    }

    fn file_written(&self, path: &Path, count: usize) {
        info!(path = %path.display(), count, "Updated temperature file");
    }
}

/// A single report captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// See [`PipelineObserver::line_skipped`].
    LineSkipped(String),
    /// See [`PipelineObserver::read_failed`].
    ReadFailed(PathBuf),
    /// See [`PipelineObserver::watch_failed`].
    WatchFailed(String),
    /// See [`PipelineObserver::event_settled`].
    EventSettled(WatchEventKind),
    /// See [`PipelineObserver::broadcast_sent`].
    BroadcastSent {
        /// Number of readings in the pushed list.
        readings: usize,
        /// Number of sessions that received it.
        sessions: usize,
    },
    /// See [`PipelineObserver::file_written`].
    FileWritten(usize),
}

/// Observer that stores every report in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    entries: Mutex<Vec<Diagnostic>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in report order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Number of recorded entries matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.lock().iter().filter(|d| predicate(d)).count()
    }

    fn push(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }
}

impl PipelineObserver for RecordingObserver {
    fn line_skipped(&self, line: &str) {
        self.push(Diagnostic::LineSkipped(line.to_owned()));
    }

    fn read_failed(&self, path: &Path, _error: &std::io::Error) {
        self.push(Diagnostic::ReadFailed(path.to_path_buf()));
    }

    fn watch_failed(&self, error: &str) {
        self.push(Diagnostic::WatchFailed(error.to_owned()));
    }

    fn event_settled(&self, kind: WatchEventKind, _path: &Path) {
        self.push(Diagnostic::EventSettled(kind));
    }

    fn broadcast_sent(&self, readings: usize, sessions: usize) {
        self.push(Diagnostic::BroadcastSent { readings, sessions });
    }

    fn file_written(&self, _path: &Path, count: usize) {
        self.push(Diagnostic::FileWritten(count));
    }
}
