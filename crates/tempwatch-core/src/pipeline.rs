//! The watch → parse → broadcast loop.
//!
//! A single task consumes the watcher's event stream in order, so at
//! most one read-and-publish cycle is in flight at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::broadcast::{Broadcaster, TemperatureUpdate};
use crate::observe::SharedObserver;
use crate::source::read_and_parse;
use crate::watcher::{WatchEvent, WatchEventKind};

/// Consumes settled watch events and publishes the resulting readings.
pub struct Pipeline {
    broadcaster: Arc<Broadcaster>,
    observer: SharedObserver,
}

impl Pipeline {
    /// Create a pipeline publishing through `broadcaster`.
    pub const fn new(broadcaster: Arc<Broadcaster>, observer: SharedObserver) -> Self {
        Self {
            broadcaster,
            observer,
        }
    }

    /// Process events until the stream ends.
    ///
    /// `stop` is the watcher's stop token: results of reads that
    /// complete after it fired are discarded.
    pub async fn run(self, mut events: mpsc::Receiver<WatchEvent>, stop: CancellationToken) {
        while let Some(event) = events.recv().await {
            self.handle(&event, &stop).await;
        }
        debug!("Pipeline event stream closed");
    }

    /// Run one cycle for `event`.
    ///
    /// Returns the number of sessions reached, or `None` when the result
    /// was discarded because the watcher had been stopped.
    pub async fn handle(&self, event: &WatchEvent, stop: &CancellationToken) -> Option<usize> {
        let update = match event.kind {
            WatchEventKind::Created | WatchEventKind::Modified => {
                TemperatureUpdate::new(read_and_parse(&event.path, self.observer.as_ref()).await)
            }
            WatchEventKind::Removed => TemperatureUpdate::empty(),
        };

        if stop.is_cancelled() {
            debug!(kind = %event.kind, "Watcher stopped, discarding update");
            return None;
        }

        let sessions = self.broadcaster.publish(&update).await;
        self.observer.broadcast_sent(update.len(), sessions);
        Some(sessions)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::Path;

    use chrono::Utc;

    use super::*;
    use crate::observe::{Diagnostic, RecordingObserver};

    fn event(kind: WatchEventKind, path: &Path) -> WatchEvent {
        WatchEvent {
            kind,
            path: path.to_path_buf(),
            observed_at: Utc::now(),
        }
    }

    fn pipeline() -> (Pipeline, Arc<Broadcaster>, Arc<RecordingObserver>) {
        let broadcaster = Arc::new(Broadcaster::new());
        let observer = Arc::new(RecordingObserver::new());
        let pipeline = Pipeline::new(Arc::clone(&broadcaster), observer.clone());
        (pipeline, broadcaster, observer)
    }

    #[tokio::test]
    async fn created_event_publishes_parsed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        std::fs::write(&path, "32C\n\n100F\nbogus\n").unwrap();
        let (pipeline, broadcaster, observer) = pipeline();
        let mut session = broadcaster.connect().await;

        let reached = pipeline
            .handle(&event(WatchEventKind::Created, &path), &CancellationToken::new())
            .await;

        assert_eq!(reached, Some(1));
        let update = session.receiver.recv().await.unwrap();
        assert_eq!(update.len(), 2);
        assert_eq!(update.readings()[0].original, "32C");
        assert_eq!(update.readings()[1].original, "100F");
        assert!(observer.entries().contains(&Diagnostic::BroadcastSent {
            readings: 2,
            sessions: 1
        }));
    }

    #[tokio::test]
    async fn removed_event_publishes_empty_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        // Content on disk is ignored for removals.
        std::fs::write(&path, "32C\n").unwrap();
        let (pipeline, broadcaster, observer) = pipeline();
        let mut session = broadcaster.connect().await;

        pipeline
            .handle(&event(WatchEventKind::Removed, &path), &CancellationToken::new())
            .await;

        assert!(session.receiver.recv().await.unwrap().is_empty());
        assert_eq!(observer.count(|d| matches!(d, Diagnostic::ReadFailed(_))), 0);
    }

    #[tokio::test]
    async fn unreadable_file_publishes_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        let (pipeline, broadcaster, observer) = pipeline();
        let mut session = broadcaster.connect().await;

        pipeline
            .handle(&event(WatchEventKind::Modified, &path), &CancellationToken::new())
            .await;

        assert!(session.receiver.recv().await.unwrap().is_empty());
        assert_eq!(observer.count(|d| matches!(d, Diagnostic::ReadFailed(_))), 1);
    }

    #[tokio::test]
    async fn result_is_discarded_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        std::fs::write(&path, "32C\n").unwrap();
        let (pipeline, broadcaster, _observer) = pipeline();
        let mut session = broadcaster.connect().await;
        let stop = CancellationToken::new();
        stop.cancel();

        let reached = pipeline
            .handle(&event(WatchEventKind::Modified, &path), &stop)
            .await;

        assert_eq!(reached, None);
        assert!(session.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_processes_events_in_order_until_stream_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temperature.txt");
        std::fs::write(&path, "1C\n2C\n").unwrap();
        let (pipeline, broadcaster, _observer) = pipeline();
        let mut session = broadcaster.connect().await;

        let (tx, rx) = mpsc::channel(8);
        tx.send(event(WatchEventKind::Created, &path)).await.unwrap();
        tx.send(event(WatchEventKind::Removed, &path)).await.unwrap();
        drop(tx);

        pipeline.run(rx, CancellationToken::new()).await;

        assert_eq!(session.receiver.recv().await.unwrap().len(), 2);
        assert!(session.receiver.recv().await.unwrap().is_empty());
    }
}
