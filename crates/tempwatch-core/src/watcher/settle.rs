//! Settling state machine for the change watcher.
//!
//! Pure timing logic with no I/O: the driver feeds it raw activity
//! notifications and periodic probes of the file, and it decides when a
//! burst of writes has settled. All timestamps are passed in, so the
//! behaviour is fully deterministic under test.

use std::fs::Metadata;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use super::WatchEventKind;

/// Cheap identity of the file's content state: length plus mtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    /// Build a fingerprint from explicit parts.
    pub const fn new(len: u64, modified: Option<SystemTime>) -> Self {
        Self { len, modified }
    }

    /// Fingerprint of a file's current metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

/// Result of looking at the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The file does not exist.
    Missing,
    /// The file exists with the given fingerprint.
    Present(Fingerprint),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: WatchEventKind,
    fingerprint: Option<Fingerprint>,
    last_activity: Instant,
}

/// Collapses bursts of activity into settled events.
///
/// A change settles once the file's fingerprint has stayed the same for
/// the stability threshold. Every fresh activity or fingerprint change
/// restarts the window. Removal is reported on the probe that observes
/// it, discarding any pending change.
#[derive(Debug, Clone)]
pub struct Settler {
    threshold: Duration,
    present: bool,
    settled: Option<Fingerprint>,
    pending: Option<Pending>,
}

impl Settler {
    /// Create a settler that knows nothing about the file yet.
    pub const fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            present: false,
            settled: None,
            pending: None,
        }
    }

    /// Whether a change is waiting to settle.
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the startup state.
    ///
    /// A file that already exists is reported as `Created` right away.
    pub fn prime(&mut self, probe: Probe) -> Option<WatchEventKind> {
        match probe {
            Probe::Present(fingerprint) => {
                self.present = true;
                self.settled = Some(fingerprint);
                Some(WatchEventKind::Created)
            }
            Probe::Missing => None,
        }
    }

    /// The platform reported activity on the file at `now`.
    pub fn activity(&mut self, now: Instant) {
        if let Some(pending) = self.pending.as_mut() {
            pending.last_activity = now;
        } else {
            self.pending = Some(Pending {
                kind: self.next_kind(),
                fingerprint: None,
                last_activity: now,
            });
        }
    }

    /// Feed the current on-disk state and return an event if one is due.
    pub fn probe(&mut self, probe: Probe, now: Instant) -> Option<WatchEventKind> {
        match probe {
            Probe::Missing => {
                self.pending = None;
                self.settled = None;
                let was_present = std::mem::replace(&mut self.present, false);
                was_present.then_some(WatchEventKind::Removed)
            }
            Probe::Present(fingerprint) => self.probe_present(fingerprint, now),
        }
    }

    fn probe_present(&mut self, fingerprint: Fingerprint, now: Instant) -> Option<WatchEventKind> {
        let Some(pending) = self.pending.as_mut() else {
            // Changes the platform notifier missed still show up here.
            if !self.present || self.settled != Some(fingerprint) {
                self.pending = Some(Pending {
                    kind: self.next_kind(),
                    fingerprint: Some(fingerprint),
                    last_activity: now,
                });
            }
            return None;
        };

        if pending.fingerprint != Some(fingerprint) {
            pending.fingerprint = Some(fingerprint);
            pending.last_activity = now;
            return None;
        }

        if now.saturating_duration_since(pending.last_activity) < self.threshold {
            return None;
        }

        let kind = pending.kind;
        self.pending = None;
        self.present = true;
        self.settled = Some(fingerprint);
        Some(kind)
    }

    const fn next_kind(&self) -> WatchEventKind {
        if self.present {
            WatchEventKind::Modified
        } else {
            WatchEventKind::Created
        }
    }
}
